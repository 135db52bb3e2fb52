//! Module catalogs.
//!
//! Every source of modules implements [`ModuleCatalog`]: a single type, a
//! binary, a directory of binaries, or a composition of other catalogs.
//! Catalogs are initialized asynchronously and then queried synchronously.

pub mod binary;
pub mod composite;
pub mod directory;
pub mod empty;
pub mod single;

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::LoadContextOptions;
use crate::criteria::FinderOptions;
use crate::error::{ModuleError, Result};
use crate::module::Module;
use crate::naming::NamingOptions;

pub use binary::{BinaryCatalog, BinaryCatalogOptions};
pub use composite::CompositeCatalog;
pub use directory::{DirectoryCatalog, DirectoryCatalogOptions};
pub use empty::EmptyCatalog;
pub use single::{TypeCatalog, TypeCatalogOptions};

/// A source of modules.
#[async_trait]
pub trait ModuleCatalog: Send + Sync {
    /// Discover modules. Running it again discovers again.
    async fn initialize(&mut self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Discovered modules; empty before initialization.
    fn modules(&self) -> Vec<Arc<Module>>;

    /// The module with exactly this name and version.
    fn get(&self, name: &str, version: &semver::Version) -> Option<Arc<Module>>;
}

#[async_trait]
impl<T: ModuleCatalog + ?Sized> ModuleCatalog for Box<T> {
    async fn initialize(&mut self) -> Result<()> {
        (**self).initialize().await
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    fn modules(&self) -> Vec<Arc<Module>> {
        (**self).modules()
    }

    fn get(&self, name: &str, version: &semver::Version) -> Option<Arc<Module>> {
        (**self).get(name, version)
    }
}

/// Convenience queries over any catalog.
pub trait ModuleCatalogExt: ModuleCatalog {
    /// The only module of the catalog.
    fn single(&self) -> Result<Arc<Module>> {
        if !self.is_initialized() {
            return Err(ModuleError::NotInitialized);
        }
        let mut modules = self.modules();
        if modules.len() != 1 {
            return Err(ModuleError::InvalidArgument(format!(
                "expected exactly one module, found {}",
                modules.len()
            )));
        }
        Ok(modules.remove(0))
    }

    /// Modules carrying `tag`.
    fn by_tag(&self, tag: &str) -> Vec<Arc<Module>> {
        self.modules()
            .into_iter()
            .filter(|module| module.has_tag(tag))
            .collect()
    }
}

impl<T: ModuleCatalog + ?Sized> ModuleCatalogExt for T {}

/// Option values shared by the catalogs an application builds.
///
/// Built once by the caller and passed to `*Options::from_defaults`; options
/// set explicitly on a catalog take precedence.
#[derive(Debug, Clone, Default)]
pub struct CatalogDefaults {
    pub naming: NamingOptions,
    pub criteria: FinderOptions,
    pub load_context: LoadContextOptions,
}

impl CatalogDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_naming(mut self, naming: NamingOptions) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_criteria(mut self, criteria: FinderOptions) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_load_context(mut self, load_context: LoadContextOptions) -> Self {
        self.load_context = load_context;
        self
    }
}
