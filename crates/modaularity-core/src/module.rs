//! Discovered modules.

use std::fmt;

use serde::Serialize;

use crate::binary::ModuleType;

/// Identifier of the catalog that produced a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CatalogId(uuid::Uuid);

impl CatalogId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CatalogId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One qualifying type, as exposed by a catalog.
///
/// Created once during catalog initialization and never modified.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub version: semver::Version,
    pub module_type: ModuleType,
    /// Catalog that created this module.
    pub catalog: CatalogId,
    pub description: String,
    pub product_version: String,
    /// Tags in attribution order; the first is the primary tag.
    pub tags: Vec<String>,
}

impl Module {
    /// The primary tag.
    pub fn tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.version)
    }
}
