//! Package client collaborator and download manifests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use modaularity_core::{ModuleError, Result, RuntimeHint};

/// File name of the persisted manifest inside a packages folder.
pub const MANIFEST_FILE_NAME: &str = ".downloadResult.json";

/// A package source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFeed {
    pub name: String,
    /// Feed location; its interpretation belongs to the client.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl PackageFeed {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// A package found by a feed search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRef {
    pub id: String,
    pub version: String,
}

impl PackageRef {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

/// Parameters of one package download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Folder the package is extracted into.
    pub folder: PathBuf,
    pub name: String,
    /// `None` for the latest version.
    pub version: Option<String>,
    pub include_prerelease: bool,
    pub feed: Option<PackageFeed>,
    pub include_secondary_feeds: bool,
    pub target_framework: Option<String>,
    /// Whether the client should retry a failed download. Honored by the
    /// client; opaque to catalogs.
    pub auto_retry: bool,
}

impl DownloadRequest {
    pub fn new(folder: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            name: name.into(),
            version: None,
            include_prerelease: false,
            feed: None,
            include_secondary_feeds: false,
            target_framework: None,
            auto_retry: false,
        }
    }
}

/// A runtime dependency delivered with a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeBinary {
    pub file_name: String,
    pub full_path: PathBuf,
    pub is_native: bool,
    pub is_recommended: bool,
}

impl RuntimeBinary {
    pub fn to_hint(&self) -> RuntimeHint {
        RuntimeHint::new(self.file_name.clone(), self.full_path.clone(), self.is_native)
    }
}

/// Result of a package download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Module binaries, relative to the packages folder.
    pub module_binary_files: Vec<String>,
    pub runtime_binaries: Vec<RuntimeBinary>,
}

impl Manifest {
    /// Hints for every recommended runtime binary.
    pub fn recommended_hints(&self) -> Vec<RuntimeHint> {
        self.runtime_binaries
            .iter()
            .filter(|binary| binary.is_recommended)
            .map(RuntimeBinary::to_hint)
            .collect()
    }

    /// Read a persisted manifest.
    pub async fn read(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Persist as indented JSON.
    pub async fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Searches feeds and downloads packages.
#[async_trait]
pub trait PackageClient: Send + Sync {
    async fn search(
        &self,
        feed: &PackageFeed,
        term: Option<&str>,
        max_results: usize,
        include_prerelease: bool,
    ) -> Result<Vec<PackageRef>>;

    async fn download(&self, request: &DownloadRequest) -> Result<Manifest>;
}

/// Wrap a client-side failure.
pub fn package_error(message: impl std::fmt::Display) -> ModuleError {
    ModuleError::Package(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_json_shape() {
        let manifest = Manifest {
            module_binary_files: vec!["ops/Operators.modb".to_string()],
            runtime_binaries: vec![
                RuntimeBinary {
                    file_name: "Json.modb".to_string(),
                    full_path: PathBuf::from("/packages/json/Json.modb"),
                    is_native: false,
                    is_recommended: true,
                },
                RuntimeBinary {
                    file_name: "libzip.so".to_string(),
                    full_path: PathBuf::from("/packages/zip/libzip.so"),
                    is_native: true,
                    is_recommended: false,
                },
            ],
        };

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["moduleBinaryFiles"][0], "ops/Operators.modb");
        assert_eq!(json["runtimeBinaries"][0]["isRecommended"], true);

        let hints = manifest.recommended_hints();
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].file_name, "Json.modb");
        assert!(!hints[0].is_native);
    }

    #[tokio::test]
    async fn test_manifest_persistence_is_indented() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        let manifest = Manifest {
            module_binary_files: vec!["Operators.modb".to_string()],
            runtime_binaries: Vec::new(),
        };

        manifest.write(&path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"moduleBinaryFiles\""));
        assert_eq!(Manifest::read(&path).await.unwrap(), manifest);
    }
}
