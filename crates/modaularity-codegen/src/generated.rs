//! Catalog over modules compiled from source text.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use modaularity_core::{
    Binary, BinaryCatalog, BinaryCatalogOptions, CatalogDefaults, CatalogId, Criteria, FinderOptions,
    LoadContextOptions, Module, ModuleCatalog, ModuleError, NamingOptions, Result,
};

use crate::compiler::{Compiler, MetadataCompiler};
use crate::script::{analyze, wrap, KnownTypes};
use crate::syntax::{classify, SourceKind};
use crate::wrapper::{SourceWriter, WrapperNames};

pub const DEFAULT_MODULE_NAME: &str = "GeneratedCode";

/// Options for [`GeneratedCatalog`].
#[derive(Clone)]
pub struct GeneratedCatalogOptions {
    /// Names of the wrapper synthesized around a script.
    pub names: WrapperNames,
    /// Whether the script wrapper method is `async`.
    pub returns_future: bool,
    /// Binaries the source may refer to, besides the host's.
    pub additional_references: Vec<Arc<Binary>>,
    /// Extra `use` paths placed ahead of the source.
    pub additional_imports: Vec<String>,
    /// Name applied by [`with_module_name`](Self::with_module_name).
    pub module_name: String,
    /// Version applied by [`with_module_version`](Self::with_module_version).
    pub module_version: semver::Version,
    pub naming: NamingOptions,
    /// Tags given to every module found.
    pub tags: Vec<String>,
    pub compiler: Arc<dyn Compiler>,
    pub load_context: LoadContextOptions,
}

impl Default for GeneratedCatalogOptions {
    fn default() -> Self {
        Self {
            names: WrapperNames::default(),
            returns_future: true,
            additional_references: Vec::new(),
            additional_imports: Vec::new(),
            module_name: DEFAULT_MODULE_NAME.to_string(),
            module_version: semver::Version::new(1, 0, 0),
            naming: NamingOptions::default(),
            tags: Vec::new(),
            compiler: Arc::new(MetadataCompiler::new()),
            load_context: LoadContextOptions::default(),
        }
    }
}

impl GeneratedCatalogOptions {
    pub fn from_defaults(defaults: &CatalogDefaults) -> Self {
        Self {
            naming: defaults.naming.clone(),
            load_context: defaults.load_context.clone(),
            ..Self::default()
        }
    }

    pub fn with_names(mut self, names: WrapperNames) -> Self {
        self.names = names;
        self
    }

    pub fn with_returns_future(mut self, returns_future: bool) -> Self {
        self.returns_future = returns_future;
        self
    }

    pub fn with_reference(mut self, binary: Arc<Binary>) -> Self {
        self.additional_references.push(binary);
        self
    }

    pub fn with_import(mut self, import: impl Into<String>) -> Self {
        self.additional_imports.push(import.into());
        self
    }

    /// Name every module `name`.
    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self.naming = self.naming.with_fixed_name(self.module_name.clone());
        self
    }

    /// Give every module `version`.
    pub fn with_module_version(mut self, version: semver::Version) -> Self {
        self.module_version = version;
        self.naming = self.naming.with_fixed_version(self.module_version.clone());
        self
    }

    pub fn with_module_description(mut self, description: impl Into<String>) -> Self {
        self.naming = self.naming.with_fixed_description(description);
        self
    }

    pub fn with_module_product_version(mut self, product_version: impl Into<String>) -> Self {
        self.naming = self.naming.with_fixed_product_version(product_version);
        self
    }

    pub fn with_naming(mut self, naming: NamingOptions) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_load_context(mut self, load_context: LoadContextOptions) -> Self {
        self.load_context = load_context;
        self
    }
}

impl fmt::Debug for GeneratedCatalogOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedCatalogOptions")
            .field("names", &self.names)
            .field("returns_future", &self.returns_future)
            .field("additional_references", &self.additional_references.len())
            .field("additional_imports", &self.additional_imports)
            .field("module_name", &self.module_name)
            .field("module_version", &self.module_version)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// Modules compiled from source text.
///
/// Source declaring any `struct`, `enum` or `trait` is compiled as written,
/// after the standard imports. Anything else is a script and is wrapped into
/// a single method first, see [`crate::script`].
pub struct GeneratedCatalog {
    id: CatalogId,
    code: String,
    options: GeneratedCatalogOptions,
    catalog: Option<BinaryCatalog>,
}

impl GeneratedCatalog {
    /// Empty or blank `code` is an argument error.
    pub fn new(code: impl Into<String>, options: GeneratedCatalogOptions) -> Result<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(ModuleError::InvalidArgument("source code is required".to_string()));
        }

        Ok(Self {
            id: CatalogId::new(),
            code,
            options,
            catalog: None,
        })
    }

    pub fn id(&self) -> CatalogId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// The compiled binary, once initialized.
    pub fn binary(&self) -> Option<&Arc<Binary>> {
        self.catalog.as_ref().and_then(BinaryCatalog::binary)
    }

    /// The additional references followed by the host binaries they do not
    /// shadow. The shared host itself is not modified.
    fn references(&self) -> Vec<Arc<Binary>> {
        let mut references = self.options.additional_references.clone();
        for binary in self.options.load_context.host.binaries() {
            if !references
                .iter()
                .any(|known| known.name().eq_ignore_ascii_case(binary.name()))
            {
                references.push(binary);
            }
        }
        references
    }

    fn source(&self, references: &[Arc<Binary>]) -> Result<String> {
        let kind = classify(&self.code)
            .map_err(|e| ModuleError::invalid_source(format!("syntax error: {}", e), self.code.as_str()))?;

        match kind {
            SourceKind::Script => {
                let analysis = analyze(&self.code, &KnownTypes::with_references(references))?;
                Ok(wrap(
                    &analysis,
                    &self.options.names,
                    self.options.returns_future,
                    &self.options.additional_imports,
                ))
            }
            SourceKind::Declarations => {
                let mut writer = SourceWriter::new();
                writer.imports(&self.options.additional_imports);
                let mut source = writer.finish();
                source.push_str(&self.code);
                Ok(source)
            }
        }
    }
}

/// Re-shape any failure as an invalid-source error over the caller's code.
fn invalid_source(error: ModuleError, code: &str) -> ModuleError {
    match error {
        ModuleError::InvalidSource { message, .. } => ModuleError::invalid_source(message, code),
        other => ModuleError::invalid_source(other.to_string(), code),
    }
}

#[async_trait]
impl ModuleCatalog for GeneratedCatalog {
    async fn initialize(&mut self) -> Result<()> {
        let references = self.references();
        let source = self.source(&references).map_err(|e| invalid_source(e, &self.code))?;

        let binary = self
            .options
            .compiler
            .generate_binary(&source, &references)
            .await
            .map_err(|e| invalid_source(e, &self.code))?;
        tracing::debug!(binary = %binary.name(), types = binary.types().len(), "Compiled generated source");

        let mut finder = FinderOptions::new();
        if !self.options.tags.is_empty() {
            finder = finder.with_criteria(Criteria::any().with_tags(self.options.tags.clone()));
        }
        let options = BinaryCatalogOptions {
            naming: self.options.naming.clone(),
            finder,
            load_context: self.options.load_context.clone(),
        };

        let mut catalog = BinaryCatalog::from_binary(binary, options)
            .with_references(self.options.additional_references.clone());
        catalog.initialize().await?;
        self.catalog = Some(catalog);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.catalog.as_ref().is_some_and(BinaryCatalog::is_initialized)
    }

    fn modules(&self) -> Vec<Arc<Module>> {
        self.catalog.as_ref().map(BinaryCatalog::modules).unwrap_or_default()
    }

    fn get(&self, name: &str, version: &semver::Version) -> Option<Arc<Module>> {
        self.catalog.as_ref().and_then(|catalog| catalog.get(name, version))
    }
}
