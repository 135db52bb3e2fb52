//! Catalog over one known type.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::binary::ModuleType;
use crate::criteria::{FinderOptions, TypeFinder};
use crate::error::{ModuleError, Result};
use crate::host::HostEnvironment;
use crate::module::{CatalogId, Module};
use crate::naming::NamingOptions;
use crate::resolver::{BinaryScope, TypeResolver};

use super::{CatalogDefaults, ModuleCatalog};

/// Options for [`TypeCatalog`].
#[derive(Clone, Default)]
pub struct TypeCatalogOptions {
    pub naming: NamingOptions,
    /// Criteria evaluated only to attribute tags.
    pub finder: FinderOptions,
    /// Resolver for type references in criteria; defaults to the type's own
    /// binary plus `host`.
    pub resolver: Option<Arc<dyn TypeResolver>>,
    pub host: Option<Arc<HostEnvironment>>,
}

impl TypeCatalogOptions {
    pub fn from_defaults(defaults: &CatalogDefaults) -> Self {
        Self {
            naming: defaults.naming.clone(),
            finder: defaults.criteria.clone(),
            resolver: None,
            host: Some(Arc::clone(&defaults.load_context.host)),
        }
    }

    pub fn with_naming(mut self, naming: NamingOptions) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_finder(mut self, finder: FinderOptions) -> Self {
        self.finder = finder;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn TypeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_host(mut self, host: Arc<HostEnvironment>) -> Self {
        self.host = Some(host);
        self
    }
}

impl fmt::Debug for TypeCatalogOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalogOptions")
            .field("finder", &self.finder)
            .field("has_resolver", &self.resolver.is_some())
            .finish_non_exhaustive()
    }
}

/// Exposes exactly one module for one type.
///
/// Criteria never exclude the type; each matching criterion only contributes
/// its tags.
#[derive(Debug)]
pub struct TypeCatalog {
    id: CatalogId,
    module_type: ModuleType,
    options: TypeCatalogOptions,
    module: Option<Arc<Module>>,
}

impl TypeCatalog {
    pub fn new(module_type: Option<ModuleType>, options: TypeCatalogOptions) -> Result<Self> {
        let module_type = module_type
            .ok_or_else(|| ModuleError::InvalidArgument("module type is required".to_string()))?;
        Ok(Self::from_type(module_type, options))
    }

    pub fn from_type(module_type: ModuleType, options: TypeCatalogOptions) -> Self {
        Self {
            id: CatalogId::new(),
            module_type,
            options,
            module: None,
        }
    }

    pub fn id(&self) -> CatalogId {
        self.id
    }

    pub fn module_type(&self) -> &ModuleType {
        &self.module_type
    }

    fn tags(&self) -> Vec<String> {
        let scope;
        let resolver: &dyn TypeResolver = match &self.options.resolver {
            Some(resolver) => resolver.as_ref(),
            None => {
                scope = BinaryScope::new(
                    Arc::clone(self.module_type.binary()),
                    self.options.host.clone(),
                );
                &scope
            }
        };

        let finder = TypeFinder::new();
        let mut tags: Vec<String> = Vec::new();
        for criteria in &self.options.finder.criteria {
            if !finder.is_match(criteria, &self.module_type, resolver) {
                continue;
            }
            for tag in &criteria.tags {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        tags
    }
}

#[async_trait]
impl ModuleCatalog for TypeCatalog {
    async fn initialize(&mut self) -> Result<()> {
        let naming = &self.options.naming;
        let ty = &self.module_type;
        let module = Module {
            name: naming.name(ty),
            version: naming.version(ty),
            module_type: ty.clone(),
            catalog: self.id,
            description: naming.description(ty),
            product_version: naming.product_version(ty),
            tags: self.tags(),
        };

        tracing::debug!(module = %module, tags = ?module.tags, "Initialized type catalog");
        self.module = Some(Arc::new(module));
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.module.is_some()
    }

    fn modules(&self) -> Vec<Arc<Module>> {
        self.module.iter().cloned().collect()
    }

    fn get(&self, name: &str, version: &semver::Version) -> Option<Arc<Module>> {
        self.module
            .as_ref()
            .filter(|module| module.name.eq_ignore_ascii_case(name) && &module.version == version)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{Binary, BinaryImage, TypeDescriptor};
    use crate::criteria::{Criteria, CriteriaBuilder};
    use crate::naming::DEFAULT_VERSION;

    fn sum_type() -> ModuleType {
        let binary = Arc::new(Binary::from_image(
            BinaryImage::builder("Ops")
                .with_type(TypeDescriptor::new("ops", "SumOperator"))
                .build(),
            None,
            None,
        ));
        binary.exported_types().remove(0)
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(matches!(
            TypeCatalog::new(None, TypeCatalogOptions::default()),
            Err(ModuleError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_non_matching_criteria_only_skip_tags() {
        let finder = FinderOptions::new()
            .with_criteria(CriteriaBuilder::new().has_name("*Sum*").tag("math"))
            .with_criteria(CriteriaBuilder::new().has_name("*Text*").tag("text"))
            .with_criteria(Criteria::any().with_tags(["all", "math"]));
        let mut catalog = TypeCatalog::new(
            Some(sum_type()),
            TypeCatalogOptions::default().with_finder(finder),
        )
        .unwrap();

        assert!(!catalog.is_initialized());
        assert!(catalog.modules().is_empty());

        catalog.initialize().await.unwrap();
        let modules = catalog.modules();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].tags, vec!["math", "all"]);
        assert_eq!(modules[0].tag(), Some("math"));
        assert_eq!(modules[0].catalog, catalog.id());
    }

    #[tokio::test]
    async fn test_get_requires_exact_version() {
        let mut catalog = TypeCatalog::from_type(sum_type(), TypeCatalogOptions::default());
        catalog.initialize().await.unwrap();

        assert!(catalog.get("OPS::SUMOPERATOR", &DEFAULT_VERSION).is_some());
        assert!(catalog.get("ops::SumOperator", &semver::Version::new(1, 0, 1)).is_none());
        assert!(catalog.get("ops::Other", &DEFAULT_VERSION).is_none());
    }
}
