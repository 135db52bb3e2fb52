//! Ordered aggregation of catalogs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::module::Module;

use super::ModuleCatalog;

/// Catalog over an ordered list of child catalogs.
///
/// Children are initialized one at a time and the first failure aborts.
/// Modules are not de-duplicated across children.
#[derive(Default)]
pub struct CompositeCatalog {
    catalogs: Vec<Box<dyn ModuleCatalog>>,
    initialized: bool,
}

impl CompositeCatalog {
    pub fn new(catalogs: Vec<Box<dyn ModuleCatalog>>) -> Self {
        Self {
            catalogs,
            initialized: false,
        }
    }

    pub fn add_catalog(&mut self, catalog: impl ModuleCatalog + 'static) {
        self.catalogs.push(Box::new(catalog));
    }

    pub fn with_catalog(mut self, catalog: impl ModuleCatalog + 'static) -> Self {
        self.add_catalog(catalog);
        self
    }

    pub fn catalogs(&self) -> &[Box<dyn ModuleCatalog>] {
        &self.catalogs
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }
}

#[async_trait]
impl ModuleCatalog for CompositeCatalog {
    async fn initialize(&mut self) -> Result<()> {
        for (index, catalog) in self.catalogs.iter_mut().enumerate() {
            if let Err(e) = catalog.initialize().await {
                tracing::warn!(catalog = index, error = %e, "Child catalog failed to initialize");
                return Err(e);
            }
        }
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn modules(&self) -> Vec<Arc<Module>> {
        self.catalogs
            .iter()
            .flat_map(|catalog| catalog.modules())
            .collect()
    }

    fn get(&self, name: &str, version: &semver::Version) -> Option<Arc<Module>> {
        self.catalogs
            .iter()
            .find_map(|catalog| catalog.get(name, version))
    }
}

impl std::fmt::Debug for CompositeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeCatalog")
            .field("catalogs", &self.catalogs.len())
            .field("initialized", &self.initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{Binary, BinaryImage, TypeDescriptor};
    use crate::catalog::{EmptyCatalog, ModuleCatalogExt, TypeCatalog, TypeCatalogOptions};
    use crate::error::ModuleError;
    use crate::naming::DEFAULT_VERSION;

    fn type_catalog(name: &str) -> TypeCatalog {
        let binary = Arc::new(Binary::from_image(
            BinaryImage::builder("Ops")
                .with_type(TypeDescriptor::new("ops", name))
                .build(),
            None,
            None,
        ));
        TypeCatalog::from_type(binary.exported_types().remove(0), TypeCatalogOptions::default())
    }

    struct FailingCatalog;

    #[async_trait]
    impl ModuleCatalog for FailingCatalog {
        async fn initialize(&mut self) -> Result<()> {
            Err(ModuleError::BinaryNotFound("missing.modb".into()))
        }

        fn is_initialized(&self) -> bool {
            false
        }

        fn modules(&self) -> Vec<Arc<Module>> {
            Vec::new()
        }

        fn get(&self, _name: &str, _version: &semver::Version) -> Option<Arc<Module>> {
            None
        }
    }

    #[tokio::test]
    async fn test_children_keep_order_and_duplicates() {
        let mut catalog = CompositeCatalog::default()
            .with_catalog(type_catalog("Sum"))
            .with_catalog(EmptyCatalog)
            .with_catalog(type_catalog("Minus"))
            .with_catalog(type_catalog("Sum"));
        catalog.initialize().await.unwrap();

        let names: Vec<String> = catalog.modules().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["ops::Sum", "ops::Minus", "ops::Sum"]);

        let first = catalog.get("ops::Sum", &DEFAULT_VERSION).unwrap();
        assert!(Arc::ptr_eq(&first, &catalog.modules()[0]));
        assert!(catalog.get("ops::Sum", &semver::Version::new(2, 0, 0)).is_none());
    }

    #[tokio::test]
    async fn test_first_failure_aborts() {
        let mut catalog = CompositeCatalog::default()
            .with_catalog(type_catalog("Sum"))
            .with_catalog(FailingCatalog)
            .with_catalog(type_catalog("Minus"));

        let err = catalog.initialize().await.unwrap_err();
        assert!(matches!(err, ModuleError::BinaryNotFound(_)));
        assert!(!catalog.is_initialized());
        assert!(!catalog.catalogs()[2].is_initialized());
        assert!(matches!(catalog.single(), Err(ModuleError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_empty_composite_initializes() {
        let mut catalog = CompositeCatalog::new(Vec::new());
        assert!(catalog.is_empty());
        catalog.initialize().await.unwrap();
        assert!(catalog.is_initialized());
        assert!(catalog.modules().is_empty());
    }
}
