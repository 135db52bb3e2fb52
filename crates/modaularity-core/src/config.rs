//! Declarative catalog configuration.
//!
//! Catalogs can be described in JSON or TOML:
//!
//! ```toml
//! [[modaularity.catalogs]]
//! type = "Directory"
//! path = "plugins"
//! options = { include_subfolders = false, search_patterns = ["*.modb"] }
//!
//! [[modaularity.catalogs]]
//! type = "Binary"
//! path = "extra/Ops.modb"
//! ```
//!
//! Each record is turned into a catalog by the first registered
//! [`CatalogConverter`] accepting its type tag.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{
    BinaryCatalog, BinaryCatalogOptions, CatalogDefaults, CompositeCatalog, DirectoryCatalog,
    DirectoryCatalogOptions, ModuleCatalog,
};
use crate::error::{ModuleError, Result};

/// Section searched for a `catalogs` list before the document root.
pub const DEFAULT_SECTION: &str = "modaularity";

/// One declared catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfiguration {
    #[serde(rename = "type", alias = "Type")]
    pub catalog_type: String,
    #[serde(default, alias = "Path")]
    pub path: Option<String>,
    #[serde(default, alias = "Options")]
    pub options: Option<Value>,
}

impl CatalogConfiguration {
    pub fn new(catalog_type: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            catalog_type: catalog_type.into(),
            path: Some(path.into()),
            options: None,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    fn required_path(&self) -> Result<&str> {
        self.path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .ok_or_else(|| {
                ModuleError::InvalidArgument(format!(
                    "catalog of type '{}' requires a path",
                    self.catalog_type
                ))
            })
    }
}

/// Turns a [`CatalogConfiguration`] into a catalog.
pub trait CatalogConverter: Send + Sync {
    /// Whether this converter handles the type tag; compared ignoring case.
    fn can_convert(&self, catalog_type: &str) -> bool;

    fn convert(
        &self,
        configuration: &CatalogConfiguration,
        defaults: &CatalogDefaults,
    ) -> Result<Box<dyn ModuleCatalog>>;
}

/// `Binary` / `Assembly` records.
#[derive(Debug, Default)]
pub struct BinaryCatalogConverter;

impl CatalogConverter for BinaryCatalogConverter {
    fn can_convert(&self, catalog_type: &str) -> bool {
        catalog_type.eq_ignore_ascii_case("binary") || catalog_type.eq_ignore_ascii_case("assembly")
    }

    fn convert(
        &self,
        configuration: &CatalogConfiguration,
        defaults: &CatalogDefaults,
    ) -> Result<Box<dyn ModuleCatalog>> {
        let path = configuration.required_path()?;
        Ok(Box::new(BinaryCatalog::from_path(
            path,
            BinaryCatalogOptions::from_defaults(defaults),
        )))
    }
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryOptionsConfig {
    #[serde(default, alias = "includeSubfolders", alias = "IncludeSubfolders")]
    include_subfolders: Option<bool>,
    #[serde(default, alias = "searchPatterns", alias = "SearchPatterns")]
    search_patterns: Option<Vec<String>>,
}

/// `Directory` / `Folder` records.
#[derive(Debug, Default)]
pub struct DirectoryCatalogConverter;

impl CatalogConverter for DirectoryCatalogConverter {
    fn can_convert(&self, catalog_type: &str) -> bool {
        catalog_type.eq_ignore_ascii_case("directory") || catalog_type.eq_ignore_ascii_case("folder")
    }

    fn convert(
        &self,
        configuration: &CatalogConfiguration,
        defaults: &CatalogDefaults,
    ) -> Result<Box<dyn ModuleCatalog>> {
        let path = configuration.required_path()?;

        let declared: DirectoryOptionsConfig = match &configuration.options {
            Some(options) => serde_json::from_value(options.clone()).map_err(|e| {
                ModuleError::Config(format!("invalid directory catalog options: {}", e))
            })?,
            None => DirectoryOptionsConfig::default(),
        };

        let mut options = DirectoryCatalogOptions::from_defaults(defaults);
        if let Some(include_subfolders) = declared.include_subfolders {
            options.include_subfolders = include_subfolders;
        }
        if let Some(patterns) = declared.search_patterns {
            options.search_patterns = patterns;
        }

        Ok(Box::new(DirectoryCatalog::new(path, options)?))
    }
}

/// Ordered set of converters.
pub struct ConverterRegistry {
    converters: Vec<Box<dyn CatalogConverter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// Registry with the built-in binary and directory converters.
    pub fn new() -> Self {
        Self::empty()
            .with_converter(BinaryCatalogConverter)
            .with_converter(DirectoryCatalogConverter)
    }

    pub fn empty() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    pub fn register(&mut self, converter: impl CatalogConverter + 'static) {
        self.converters.push(Box::new(converter));
    }

    pub fn with_converter(mut self, converter: impl CatalogConverter + 'static) -> Self {
        self.register(converter);
        self
    }

    pub fn convert(
        &self,
        configuration: &CatalogConfiguration,
        defaults: &CatalogDefaults,
    ) -> Result<Box<dyn ModuleCatalog>> {
        let converter = self
            .converters
            .iter()
            .find(|converter| converter.can_convert(&configuration.catalog_type))
            .ok_or_else(|| {
                ModuleError::InvalidArgument(format!(
                    "no converter for catalog type '{}'",
                    configuration.catalog_type
                ))
            })?;

        tracing::debug!(
            catalog_type = %configuration.catalog_type,
            path = ?configuration.path,
            "Building configured catalog"
        );
        converter.convert(configuration, defaults)
    }

    /// One composite catalog over every configured catalog, in order.
    pub fn build_composite(
        &self,
        configurations: &[CatalogConfiguration],
        defaults: &CatalogDefaults,
    ) -> Result<CompositeCatalog> {
        let catalogs = configurations
            .iter()
            .map(|configuration| self.convert(configuration, defaults))
            .collect::<Result<Vec<_>>>()?;
        Ok(CompositeCatalog::new(catalogs))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogList {
    #[serde(default, alias = "Catalogs")]
    catalogs: Vec<CatalogConfiguration>,
}

/// Reads catalog lists from configuration documents.
pub struct CatalogConfigLoader;

impl CatalogConfigLoader {
    /// Catalogs under `section`, or at the document root when the section
    /// has none.
    pub fn from_value(document: &Value, section: &str) -> Result<Vec<CatalogConfiguration>> {
        let has_catalogs = |value: &Value| value.get("catalogs").is_some() || value.get("Catalogs").is_some();

        let source = document
            .get(section)
            .filter(|value| has_catalogs(*value))
            .unwrap_or(document);

        let list: CatalogList = serde_json::from_value(source.clone())
            .map_err(|e| ModuleError::Config(format!("invalid catalog list: {}", e)))?;
        Ok(list.catalogs)
    }

    pub fn from_json(text: &str) -> Result<Vec<CatalogConfiguration>> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| ModuleError::Config(format!("Failed to parse JSON: {}", e)))?;
        Self::from_value(&document, DEFAULT_SECTION)
    }

    pub fn from_toml_str(text: &str) -> Result<Vec<CatalogConfiguration>> {
        let toml_value: toml::Value = toml::from_str(text)
            .map_err(|e| ModuleError::Config(format!("Failed to parse TOML: {}", e)))?;
        let document = serde_json::to_value(&toml_value)
            .map_err(|e| ModuleError::Config(format!("Failed to convert TOML: {}", e)))?;
        Self::from_value(&document, DEFAULT_SECTION)
    }

    /// Load a `.json` or `.toml` file.
    pub fn from_file(path: &Path) -> Result<Vec<CatalogConfiguration>> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_str(&content),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json(&content),
            _ => Err(ModuleError::Config(format!(
                "Unknown config format for {} (expected .json or .toml)",
                path.display()
            ))),
        }
    }
}
