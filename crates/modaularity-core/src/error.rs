//! Error types shared by every catalog.

use std::path::PathBuf;

/// Errors raised while building, initializing or querying catalogs.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// A constructor or operation received an unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The binary a catalog was pointed at does not exist.
    #[error("Binary not found: {}", .0.display())]
    BinaryNotFound(PathBuf),

    /// The file exists but is not a loadable module binary.
    #[error("Invalid binary {}: {reason}", path.display())]
    InvalidBinary { path: PathBuf, reason: String },

    /// A type reference could not be resolved.
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// The catalog was queried before `initialize` completed.
    #[error("Catalog not initialized")]
    NotInitialized,

    /// Source text could not be turned into a binary.
    ///
    /// Parse, analysis and compile failures all share this shape.
    #[error("Invalid source: {message}")]
    InvalidSource { message: String, source_text: String },

    /// The package collaborator failed.
    #[error("Package error: {0}")]
    Package(String),

    /// Declarative catalog configuration is malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ModuleError {
    /// Build an `InvalidSource` error carrying the offending text.
    pub fn invalid_source(message: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self::InvalidSource {
            message: message.into(),
            source_text: source_text.into(),
        }
    }
}

impl From<serde_json::Error> for ModuleError {
    fn from(err: serde_json::Error) -> Self {
        ModuleError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for ModuleError {
    fn from(err: bincode::Error) -> Self {
        ModuleError::Serialization(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ModuleError>;
