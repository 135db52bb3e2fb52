//! Catalog over a directory of binaries.
//!
//! Files are pre-checked through a [`MetadataContext`] so that only binaries
//! with at least one matching type are ever loaded.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};

use crate::binary::{is_binary_file, BinaryImage, BINARY_EXTENSION};
use crate::context::{HostBinaryPolicy, LoadContextOptions, MetadataContext};
use crate::criteria::{FinderOptions, TypeFinder};
use crate::error::{ModuleError, Result};
use crate::fs::{scan_files, walk_files};
use crate::module::Module;
use crate::naming::NamingOptions;

use super::{BinaryCatalog, BinaryCatalogOptions, CatalogDefaults, ModuleCatalog};

/// Options for [`DirectoryCatalog`].
#[derive(Debug, Clone)]
pub struct DirectoryCatalogOptions {
    pub include_subfolders: bool,
    /// Glob patterns matched against file names, ignoring case.
    pub search_patterns: Vec<String>,
    pub load_context: LoadContextOptions,
    pub finder: FinderOptions,
    pub naming: NamingOptions,
}

impl Default for DirectoryCatalogOptions {
    fn default() -> Self {
        Self {
            include_subfolders: true,
            search_patterns: vec![format!("*.{}", BINARY_EXTENSION)],
            load_context: LoadContextOptions::default(),
            finder: FinderOptions::default(),
            naming: NamingOptions::default(),
        }
    }
}

impl DirectoryCatalogOptions {
    pub fn from_defaults(defaults: &CatalogDefaults) -> Self {
        Self {
            load_context: defaults.load_context.clone(),
            finder: defaults.criteria.clone(),
            naming: defaults.naming.clone(),
            ..Self::default()
        }
    }

    pub fn with_include_subfolders(mut self, include_subfolders: bool) -> Self {
        self.include_subfolders = include_subfolders;
        self
    }

    pub fn with_search_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_load_context(mut self, load_context: LoadContextOptions) -> Self {
        self.load_context = load_context;
        self
    }

    pub fn with_finder(mut self, finder: FinderOptions) -> Self {
        self.finder = finder;
        self
    }

    pub fn with_naming(mut self, naming: NamingOptions) -> Self {
        self.naming = naming;
        self
    }
}

/// Modules from every qualifying binary under a root directory.
#[derive(Debug)]
pub struct DirectoryCatalog {
    root: PathBuf,
    options: DirectoryCatalogOptions,
    catalogs: Vec<BinaryCatalog>,
    initialized: bool,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>, options: DirectoryCatalogOptions) -> Result<Self> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(ModuleError::InvalidArgument("directory path is required".to_string()));
        }

        Ok(Self {
            root,
            options,
            catalogs: Vec::new(),
            initialized: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One binary catalog per qualifying file, in scan order.
    pub fn catalogs(&self) -> &[BinaryCatalog] {
        &self.catalogs
    }

    /// Files under the root matching a search pattern, each listed once.
    pub fn candidate_files(&self) -> Result<Vec<PathBuf>> {
        let patterns = self
            .options
            .search_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| {
                    ModuleError::InvalidArgument(format!("invalid search pattern '{}': {}", pattern, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let match_options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };

        let files = walk_files(&self.root, self.options.include_subfolders, |path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| {
                    patterns
                        .iter()
                        .any(|pattern| pattern.matches_with(name, match_options))
                })
                .unwrap_or(false)
        })?;

        let mut seen = HashSet::new();
        Ok(files
            .into_iter()
            .filter(|path| seen.insert(path.canonicalize().unwrap_or_else(|_| path.clone())))
            .collect())
    }

    /// Whether `path` is a binary with at least one type matching the
    /// configured criteria. Files that do not inspect as binaries never
    /// qualify.
    fn qualifies(&self, path: &Path, load_context: &mut LoadContextOptions) -> bool {
        let image = match BinaryImage::inspect(path) {
            Ok(Some(image)) => image,
            Ok(None) => {
                tracing::debug!(path = %path.display(), "Not a module binary");
                return false;
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Could not inspect file");
                return false;
            }
        };

        if self.options.finder.is_empty() {
            return true;
        }

        let metadata = MetadataContext::new(self.metadata_universe(path, load_context));
        let binary = metadata.add_primary(image, path.to_path_buf());
        let finder = TypeFinder::new();

        self.options.finder.criteria.iter().any(|criteria| {
            finder
                .find(Some(criteria), &binary, &metadata)
                .map(|found| !found.is_empty())
                .unwrap_or(false)
        })
    }

    /// Binary files a metadata-only load of `candidate` may resolve against.
    ///
    /// Host framework directories found under `Always` are added to
    /// `load_context`'s runtime paths so the full load can reach them too.
    fn metadata_universe(&self, candidate: &Path, load_context: &mut LoadContextOptions) -> Vec<PathBuf> {
        let host = Arc::clone(&load_context.host);
        let mut paths = Vec::new();

        if let Some(runtime_dir) = host.runtime_dir() {
            paths.extend(scan_files(runtime_dir, false, is_binary_file));
        }
        paths.push(candidate.to_path_buf());
        for dir in &load_context.additional_runtime_paths {
            paths.extend(scan_files(dir, false, is_binary_file));
        }

        match load_context.policy {
            HostBinaryPolicy::Always => {
                paths.extend(scan_files(host.base_dir(), true, is_binary_file));
                for dir in host.framework_dirs() {
                    if dir == host.base_dir() || Some(dir.as_path()) == host.runtime_dir() {
                        continue;
                    }
                    if !load_context.additional_runtime_paths.contains(&dir) {
                        load_context.additional_runtime_paths.push(dir.clone());
                    }
                    paths.extend(scan_files(&dir, false, is_binary_file));
                }
            }
            HostBinaryPolicy::Never => {
                if let Some(dir) = candidate.parent() {
                    paths.extend(scan_files(dir, true, is_binary_file));
                }
            }
            HostBinaryPolicy::Selected => {
                for name in &load_context.host_binaries {
                    match host.try_load(name).and_then(|binary| binary.path().map(Path::to_path_buf)) {
                        Some(path) => paths.push(path),
                        None => tracing::debug!(binary = %name, "Selected host binary not available"),
                    }
                }
            }
            HostBinaryPolicy::PreferModule => {}
        }

        paths
    }
}

#[async_trait]
impl ModuleCatalog for DirectoryCatalog {
    async fn initialize(&mut self) -> Result<()> {
        let files = self.candidate_files()?;
        let mut load_context = self.options.load_context.clone();
        let mut catalogs = Vec::new();

        for file in files {
            if !self.qualifies(&file, &mut load_context) {
                continue;
            }

            let options = BinaryCatalogOptions {
                naming: self.options.naming.clone(),
                finder: self.options.finder.clone(),
                load_context: load_context.clone(),
            };
            let mut catalog = BinaryCatalog::from_path(&file, options);
            catalog.initialize().await?;
            tracing::debug!(path = %file.display(), modules = catalog.modules().len(), "Added binary");
            catalogs.push(catalog);
        }

        tracing::info!(
            root = %self.root.display(),
            binaries = catalogs.len(),
            "Initialized directory catalog"
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
