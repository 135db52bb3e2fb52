//! A package client over feeds laid out on the local filesystem.
//!
//! ```text
//! <feed>/<package id>/<version>/            package content root
//! <feed>/<package id>/<version>/<tfm>/      optional per-target content root
//!     *.modb                                 module binaries
//!     runtimes/**                            runtime binaries (native unless .modb)
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use modaularity_core::binary::is_binary_file;
use modaularity_core::Result;

use crate::client::{
    package_error, DownloadRequest, Manifest, PackageClient, PackageFeed, PackageRef, RuntimeBinary,
};

const RUNTIMES_DIR: &str = "runtimes";

/// [`PackageClient`] reading packages from directories.
#[derive(Debug, Clone, Default)]
pub struct DirectoryFeedClient {
    /// Feeds consulted after the requested one when secondary feeds are
    /// enabled.
    secondary_feeds: Vec<PackageFeed>,
}

impl DirectoryFeedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secondary_feed(mut self, feed: PackageFeed) -> Self {
        self.secondary_feeds.push(feed);
        self
    }

    /// Versions of `id` in `feed`, highest first.
    async fn versions(&self, feed: &PackageFeed, id: &str, include_prerelease: bool) -> Vec<semver::Version> {
        let mut versions: Vec<semver::Version> = list_dirs(&Path::new(&feed.url).join(id))
            .await
            .iter()
            .filter_map(|dir| dir.file_name().and_then(|n| n.to_str()))
            .filter_map(|name| semver::Version::parse(name).ok())
            .filter(|version| include_prerelease || version.pre.is_empty())
            .collect();
        versions.sort();
        versions.reverse();
        versions
    }

    /// Content root of `request` within one feed.
    async fn locate(&self, feed: &PackageFeed, request: &DownloadRequest) -> Option<(String, PathBuf)> {
        let package_dir = Path::new(&feed.url).join(&request.name);
        let version = match &request.version {
            Some(version) => version.clone(),
            None => self
                .versions(feed, &request.name, request.include_prerelease)
                .await
                .first()?
                .to_string(),
        };

        let root = package_dir.join(&version);
        if !tokio::fs::metadata(&root).await.map(|m| m.is_dir()).unwrap_or(false) {
            return None;
        }

        if let Some(target) = &request.target_framework {
            let targeted = root.join(target);
            if tokio::fs::metadata(&targeted).await.map(|m| m.is_dir()).unwrap_or(false) {
                return Some((version, targeted));
            }
        }
        Some((version, root))
    }

    async fn extract(&self, source: &Path, request: &DownloadRequest, version: &str) -> Result<Manifest> {
        let relative = Path::new(&request.name).join(version);
        let target = request.folder.join(&relative);
        let copied = copy_tree(source, &target).await?;

        let runtimes = target.join(RUNTIMES_DIR);
        let mut manifest = Manifest::default();
        for path in copied {
            if path.starts_with(&runtimes) {
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                manifest.runtime_binaries.push(RuntimeBinary {
                    file_name: file_name.to_string(),
                    is_native: !is_binary_file(&path),
                    full_path: path.clone(),
                    is_recommended: true,
                });
            } else if is_binary_file(&path) && path.parent() == Some(target.as_path()) {
                if let Ok(inside) = path.strip_prefix(&request.folder) {
                    manifest
                        .module_binary_files
                        .push(inside.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        Ok(manifest)
    }
}

#[async_trait]
impl PackageClient for DirectoryFeedClient {
    async fn search(
        &self,
        feed: &PackageFeed,
        term: Option<&str>,
        max_results: usize,
        include_prerelease: bool,
    ) -> Result<Vec<PackageRef>> {
        let term = term.map(str::to_ascii_lowercase);
        let mut packages = Vec::new();

        for dir in list_dirs(Path::new(&feed.url)).await {
            if packages.len() >= max_results {
                break;
            }
            let Some(id) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(term) = &term {
                if !id.to_ascii_lowercase().contains(term.as_str()) {
                    continue;
                }
            }
            if let Some(latest) = self.versions(feed, id, include_prerelease).await.first() {
                packages.push(PackageRef::new(id, latest.to_string()));
            }
        }

        tracing::debug!(feed = %feed.name, found = packages.len(), "Searched feed");
        Ok(packages)
    }

    async fn download(&self, request: &DownloadRequest) -> Result<Manifest> {
        let primary = request
            .feed
            .as_ref()
            .ok_or_else(|| package_error("a feed is required for directory packages"))?;

        let mut feeds = vec![primary];
        if request.include_secondary_feeds {
            feeds.extend(self.secondary_feeds.iter());
        }

        for feed in feeds {
            let Some((version, source)) = self.locate(feed, request).await else {
                continue;
            };

            let attempts = if request.auto_retry { 2 } else { 1 };
            let mut last_error = None;
            for attempt in 1..=attempts {
                match self.extract(&source, request, &version).await {
                    Ok(manifest) => {
                        tracing::info!(
                            package = %request.name,
                            version = %version,
                            feed = %feed.name,
                            modules = manifest.module_binary_files.len(),
                            "Downloaded package"
                        );
                        return Ok(manifest);
                    }
                    Err(e) => {
                        tracing::warn!(package = %request.name, attempt, error = %e, "Package download failed");
                        last_error = Some(e);
                    }
                }
            }
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        Err(package_error(format!(
            "package '{}' {} not found",
            request.name,
            request.version.as_deref().unwrap_or("(latest)")
        )))
    }
}

/// Immediate subdirectories of `dir`, sorted; empty when unreadable.
async fn list_dirs(dir: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return dirs;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    dirs
}

/// Copy every file below `source` into `target`, returning the copies.
async fn copy_tree(source: &Path, target: &Path) -> Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    let mut pending = vec![(source.to_path_buf(), target.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let destination = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), destination));
            } else {
                tokio::fs::copy(entry.path(), &destination).await?;
                copied.push(destination);
            }
        }
    }

    copied.sort();
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modaularity_core::{BinaryImage, ModuleError};

    fn publish(feed: &Path, id: &str, version: &str) {
        let root = feed.join(id).join(version);
        BinaryImage::builder(id)
            .build()
            .write_to(&root.join(format!("{}.modb", id)))
            .unwrap();
        BinaryImage::builder("Json")
            .build()
            .write_to(&root.join(RUNTIMES_DIR).join("Json.modb"))
            .unwrap();
        std::fs::write(root.join(RUNTIMES_DIR).join("libnative.so"), b"\x7fELF").unwrap();
    }

    #[tokio::test]
    async fn test_search_picks_latest_stable() {
        let feed_dir = tempfile::tempdir().unwrap();
        publish(feed_dir.path(), "Operators", "1.0.0");
        publish(feed_dir.path(), "Operators", "1.2.0");
        publish(feed_dir.path(), "Operators", "2.0.0-beta.1");
        publish(feed_dir.path(), "Formatters", "0.3.0");

        let feed = PackageFeed::new("local", feed_dir.path().to_string_lossy());
        let client = DirectoryFeedClient::new();

        let found = client.search(&feed, Some("oper"), 10, false).await.unwrap();
        assert_eq!(found, vec![PackageRef::new("Operators", "1.2.0")]);

        let found = client.search(&feed, None, 10, true).await.unwrap();
        assert_eq!(
            found,
            vec![
                PackageRef::new("Formatters", "0.3.0"),
                PackageRef::new("Operators", "2.0.0-beta.1")
            ]
        );

        assert_eq!(client.search(&feed, None, 1, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_download_extracts_modules_and_runtimes() {
        let feed_dir = tempfile::tempdir().unwrap();
        let packages = tempfile::tempdir().unwrap();
        publish(feed_dir.path(), "Operators", "1.2.0");

        let mut request = DownloadRequest::new(packages.path(), "Operators");
        request.feed = Some(PackageFeed::new("local", feed_dir.path().to_string_lossy()));

        let manifest = DirectoryFeedClient::new().download(&request).await.unwrap();
        assert_eq!(manifest.module_binary_files, vec!["Operators/1.2.0/Operators.modb"]);
        assert_eq!(manifest.runtime_binaries.len(), 2);

        let json = manifest
            .runtime_binaries
            .iter()
            .find(|binary| binary.file_name == "Json.modb")
            .unwrap();
        assert!(!json.is_native);
        assert!(json.full_path.is_file());
        assert!(manifest
            .runtime_binaries
            .iter()
            .any(|binary| binary.file_name == "libnative.so" && binary.is_native));
    }

    #[tokio::test]
    async fn test_secondary_feeds_only_when_enabled() {
        let primary = tempfile::tempdir().unwrap();
        let secondary = tempfile::tempdir().unwrap();
        let packages = tempfile::tempdir().unwrap();
        publish(secondary.path(), "Operators", "1.0.0");

        let client = DirectoryFeedClient::new()
            .with_secondary_feed(PackageFeed::new("secondary", secondary.path().to_string_lossy()));
        let mut request = DownloadRequest::new(packages.path(), "Operators");
        request.feed = Some(PackageFeed::new("primary", primary.path().to_string_lossy()));

        assert!(matches!(client.download(&request).await, Err(ModuleError::Package(_))));

        request.include_secondary_feeds = true;
        assert_eq!(client.download(&request).await.unwrap().module_binary_files.len(), 1);
    }
}
