//! Catalog over the types of one binary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::binary::Binary;
use crate::context::{LoadContext, LoadContextOptions};
use crate::criteria::{Criteria, FinderOptions, TypeFinder};
use crate::error::{ModuleError, Result};
use crate::module::{CatalogId, Module};
use crate::naming::NamingOptions;
use crate::resolver::{BinaryScope, TypeResolver};

use super::{CatalogDefaults, ModuleCatalog, TypeCatalog, TypeCatalogOptions};

/// Options for [`BinaryCatalog`].
#[derive(Debug, Clone, Default)]
pub struct BinaryCatalogOptions {
    pub naming: NamingOptions,
    pub finder: FinderOptions,
    pub load_context: LoadContextOptions,
}

impl BinaryCatalogOptions {
    pub fn from_defaults(defaults: &CatalogDefaults) -> Self {
        Self {
            naming: defaults.naming.clone(),
            finder: defaults.criteria.clone(),
            load_context: defaults.load_context.clone(),
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

    pub fn with_criteria(mut self, criteria: impl Into<Criteria>) -> Self {
        self.finder = self.finder.with_criteria(criteria);
        self
    }

    pub fn with_load_context(mut self, load_context: LoadContextOptions) -> Self {
        self.load_context = load_context;
        self
    }
}

/// Modules found among the exported types of one binary.
///
/// A binary given by path is loaded into its own [`LoadContext`] on first
/// initialization.
#[derive(Debug)]
pub struct BinaryCatalog {
    id: CatalogId,
    path: Option<PathBuf>,
    binary: Option<Arc<Binary>>,
    context: Option<Arc<LoadContext>>,
    references: Vec<Arc<Binary>>,
    options: BinaryCatalogOptions,
    catalogs: Vec<TypeCatalog>,
    initialized: bool,
}

impl BinaryCatalog {
    /// Exactly one of `path` and `binary` must be given.
    pub fn new(
        path: Option<PathBuf>,
        binary: Option<Arc<Binary>>,
        options: BinaryCatalogOptions,
    ) -> Result<Self> {
        match (&path, &binary) {
            (Some(_), Some(_)) => {
                return Err(ModuleError::InvalidArgument(
                    "provide either a binary path or a loaded binary, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(ModuleError::InvalidArgument(
                    "a binary path or a loaded binary is required".to_string(),
                ))
            }
            _ => {}
        }

        Ok(Self {
            id: CatalogId::new(),
            path,
            binary,
            context: None,
            references: Vec::new(),
            options,
            catalogs: Vec::new(),
            initialized: false,
        })
    }

    pub fn from_path(path: impl Into<PathBuf>, options: BinaryCatalogOptions) -> Self {
        Self {
            id: CatalogId::new(),
            path: Some(path.into()),
            binary: None,
            context: None,
            references: Vec::new(),
            options,
            catalogs: Vec::new(),
            initialized: false,
        }
    }

    pub fn from_binary(binary: Arc<Binary>, options: BinaryCatalogOptions) -> Self {
        Self {
            id: CatalogId::new(),
            path: None,
            binary: Some(binary),
            context: None,
            references: Vec::new(),
            options,
            catalogs: Vec::new(),
            initialized: false,
        }
    }

    /// Binaries that types of an already-loaded binary may refer to,
    /// resolved ahead of the host.
    pub fn with_references(mut self, references: Vec<Arc<Binary>>) -> Self {
        self.references = references;
        self
    }

    pub fn id(&self) -> CatalogId {
        self.id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The binary, once loaded.
    pub fn binary(&self) -> Option<&Arc<Binary>> {
        self.binary.as_ref()
    }

    /// The loading context created for a binary given by path.
    pub fn context(&self) -> Option<&Arc<LoadContext>> {
        self.context.as_ref()
    }

    fn load(&mut self) -> Result<(Arc<Binary>, Arc<dyn TypeResolver>)> {
        if let Some(binary) = &self.binary {
            let resolver: Arc<dyn TypeResolver> = match &self.context {
                Some(context) => Arc::clone(context) as Arc<dyn TypeResolver>,
                None => Arc::new(
                    BinaryScope::new(Arc::clone(binary), Some(Arc::clone(&self.options.load_context.host)))
                        .with_references(self.references.clone()),
                ),
            };
            return Ok((Arc::clone(binary), resolver));
        }

        let path = self
            .path
            .clone()
            .ok_or_else(|| ModuleError::InvalidArgument("a binary path is required".to_string()))?;
        if !path.is_file() {
            return Err(ModuleError::BinaryNotFound(path));
        }

        let context = Arc::new(LoadContext::new(&path, self.options.load_context.clone()));
        let binary = context.load()?;
        self.binary = Some(Arc::clone(&binary));
        self.context = Some(Arc::clone(&context));
        let resolver: Arc<dyn TypeResolver> = context;
        Ok((binary, resolver))
    }
}

#[async_trait]
impl ModuleCatalog for BinaryCatalog {
    async fn initialize(&mut self) -> Result<()> {
        let (binary, resolver) = self.load()?;

        let criteria = if self.options.finder.is_empty() {
            vec![Criteria::any()]
        } else {
            self.options.finder.criteria.clone()
        };

        let finder = TypeFinder::new();
        let mut handled: HashSet<String> = HashSet::new();
        let mut catalogs: Vec<TypeCatalog> = Vec::new();
        let mut seen: HashSet<(String, semver::Version)> = HashSet::new();

        for current in &criteria {
            for ty in finder.find(Some(current), &binary, resolver.as_ref())? {
                if !handled.insert(ty.full_name()) {
                    continue;
                }

                // Every criterion is handed over so the module collects the
                // tags of all criteria it matches.
                let options = TypeCatalogOptions {
                    naming: self.options.naming.clone(),
                    finder: FinderOptions {
                        criteria: criteria.clone(),
                    },
                    resolver: Some(Arc::clone(&resolver)),
                    host: Some(Arc::clone(&self.options.load_context.host)),
                };
                let mut catalog = TypeCatalog::from_type(ty, options);
                catalog.initialize().await?;

                let duplicate = catalog
                    .modules()
                    .iter()
                    .any(|module| !seen.insert((module.name.to_ascii_lowercase(), module.version.clone())));
                if duplicate {
                    tracing::warn!(
                        binary = %binary.name(),
                        type_name = %catalog.module_type().full_name(),
                        "Skipping module with duplicate name and version"
                    );
                    continue;
                }
                catalogs.push(catalog);
            }
        }

        tracing::debug!(
            binary = %binary.name(),
            modules = catalogs.len(),
            criteria = criteria.len(),
            "Initialized binary catalog"
        );
        self.catalogs = catalogs;
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
