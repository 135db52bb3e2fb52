//! On-disk module binary format.
//!
//! ```text
//! +--------+-----------------+------------------------------+
//! | "MODB" | u16 LE version  | bincode(BinaryImage)         |
//! +--------+-----------------+------------------------------+
//! ```
//!
//! [`BinaryImage::inspect`] reads a file strictly for metadata: nothing in the
//! payload is executed, and a file that merely carries the right extension
//! without a valid header is reported as "not a binary" rather than an error.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{DependencyEntry, TypeDescriptor};
use crate::error::{ModuleError, Result};

/// File extension of module binaries.
pub const BINARY_EXTENSION: &str = "modb";

/// Leading bytes of every module binary.
pub const MAGIC: &[u8; 4] = b"MODB";

/// Current image format version.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

/// `<name>.modb`
pub fn binary_file_name(name: &str) -> String {
    format!("{}.{}", name, BINARY_EXTENSION)
}

/// Check if a path carries the module binary extension.
pub fn is_binary_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(BINARY_EXTENSION))
        .unwrap_or(false)
}

/// Serialized content of a module binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryImage {
    pub name: String,
    pub version: Option<semver::Version>,
    pub description: Option<String>,
    pub product_version: Option<String>,
    pub types: Vec<TypeDescriptor>,
    pub dependencies: Vec<DependencyEntry>,
}

impl BinaryImage {
    pub fn builder(name: impl Into<String>) -> BinaryImageBuilder {
        BinaryImageBuilder::new(name)
    }

    /// Encode header and payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode bytes, returning `None` when they are not a module binary.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return None;
        }

        let version = u16::from_le_bytes([bytes[MAGIC.len()], bytes[MAGIC.len() + 1]]);
        if version != FORMAT_VERSION {
            tracing::debug!(version, expected = FORMAT_VERSION, "Unsupported binary format version");
            return None;
        }

        bincode::deserialize(&bytes[HEADER_LEN..]).ok()
    }

    /// Open a file for metadata inspection only.
    ///
    /// `Ok(None)` means the file exists but is not a module binary.
    pub fn inspect(path: &Path) -> Result<Option<Self>> {
        let bytes = std::fs::read(path)?;
        Ok(Self::decode(&bytes))
    }

    /// Read a file that must be a module binary.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ModuleError::BinaryNotFound(path.to_path_buf()));
        }

        Self::inspect(path)?.ok_or_else(|| ModuleError::InvalidBinary {
            path: path.to_path_buf(),
            reason: "missing or corrupt module binary header".to_string(),
        })
    }

    /// Write the encoded image to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.encode()?)?;
        Ok(())
    }
}

/// Builder for [`BinaryImage`].
#[derive(Debug, Clone)]
pub struct BinaryImageBuilder {
    image: BinaryImage,
}

impl BinaryImageBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            image: BinaryImage {
                name: name.into(),
                version: None,
                description: None,
                product_version: None,
                types: Vec::new(),
                dependencies: Vec::new(),
            },
        }
    }

    pub fn with_version(mut self, version: semver::Version) -> Self {
        self.image.version = Some(version);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.image.description = Some(description.into());
        self
    }

    pub fn with_product_version(mut self, product_version: impl Into<String>) -> Self {
        self.image.product_version = Some(product_version.into());
        self
    }

    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.image.types.push(descriptor);
        self
    }

    pub fn with_dependency(mut self, dependency: DependencyEntry) -> Self {
        self.image.dependencies.push(dependency);
        self
    }

    pub fn build(self) -> BinaryImage {
        self.image
    }
}
