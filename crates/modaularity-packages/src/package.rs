//! Catalog over the module binaries of one package.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use modaularity_core::{
    BinaryCatalog, BinaryCatalogOptions, CatalogDefaults, FinderOptions, LoadContextOptions, Module,
    ModuleCatalog, ModuleError, NamingOptions, Result,
};

use crate::client::{DownloadRequest, Manifest, PackageClient, PackageFeed, MANIFEST_FILE_NAME};

/// Options for [`PackageCatalog`].
#[derive(Debug, Clone, Default)]
pub struct PackageCatalogOptions {
    pub naming: NamingOptions,
    pub finder: FinderOptions,
    /// Base loading options; the package's runtime binaries are added as
    /// hints.
    pub load_context: LoadContextOptions,
    pub include_secondary_feeds: bool,
    pub target_framework: Option<String>,
    /// Reuse the persisted manifest of a previous download. Only effective
    /// with a caller-chosen packages folder.
    pub force_package_caching: bool,
    pub custom_packages_folder: Option<PathBuf>,
    pub auto_retry: bool,
}

impl PackageCatalogOptions {
    pub fn from_defaults(defaults: &CatalogDefaults) -> Self {
        Self {
            naming: defaults.naming.clone(),
            finder: defaults.criteria.clone(),
            load_context: defaults.load_context.clone(),
            ..Self::default()
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

    pub fn with_load_context(mut self, load_context: LoadContextOptions) -> Self {
        self.load_context = load_context;
        self
    }

    pub fn with_force_package_caching(mut self, force: bool) -> Self {
        self.force_package_caching = force;
        self
    }

    pub fn with_custom_packages_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.custom_packages_folder = Some(folder.into());
        self
    }

    pub fn with_auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = auto_retry;
        self
    }

    pub fn with_target_framework(mut self, target_framework: impl Into<String>) -> Self {
        self.target_framework = Some(target_framework.into());
        self
    }

    pub fn with_secondary_feeds(mut self, include: bool) -> Self {
        self.include_secondary_feeds = include;
        self
    }
}

/// Modules from the binaries of one downloaded package.
pub struct PackageCatalog {
    client: Arc<dyn PackageClient>,
    name: String,
    version: Option<String>,
    include_prerelease: bool,
    feed: Option<PackageFeed>,
    packages_folder: PathBuf,
    has_custom_folder: bool,
    options: PackageCatalogOptions,
    catalogs: Vec<BinaryCatalog>,
    initialized: bool,
}

impl PackageCatalog {
    /// `packages_folder` overrides the options' custom folder. Without
    /// either, a fresh directory under the system temp dir is used.
    pub fn new(
        client: Arc<dyn PackageClient>,
        name: impl Into<String>,
        version: Option<String>,
        include_prerelease: bool,
        feed: Option<PackageFeed>,
        packages_folder: Option<PathBuf>,
        options: PackageCatalogOptions,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModuleError::InvalidArgument("package name is required".to_string()));
        }

        let custom = packages_folder.or_else(|| options.custom_packages_folder.clone());
        let has_custom_folder = custom.is_some();
        let packages_folder = custom.unwrap_or_else(|| {
            std::env::temp_dir()
                .join("PackageModuleCatalog")
                .join(uuid::Uuid::new_v4().to_string())
        });

        Ok(Self {
            client,
            name,
            version,
            include_prerelease,
            feed,
            packages_folder,
            has_custom_folder,
            options,
            catalogs: Vec::new(),
            initialized: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn packages_folder(&self) -> &Path {
        &self.packages_folder
    }

    pub fn binary_catalogs(&self) -> &[BinaryCatalog] {
        &self.catalogs
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.packages_folder.join(MANIFEST_FILE_NAME)
    }

    fn force_package_cache(&self) -> bool {
        self.has_custom_folder && self.options.force_package_caching
    }

    async fn cached_manifest(&self) -> Option<Manifest> {
        if !self.force_package_cache() {
            return None;
        }
        let path = self.manifest_path();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return None;
        }

        match Manifest::read(&path).await {
            Ok(manifest) => {
                tracing::debug!(package = %self.name, folder = %self.packages_folder.display(), "Using previously downloaded package");
                Some(manifest)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable package manifest");
                None
            }
        }
    }

    fn download_request(&self) -> DownloadRequest {
        DownloadRequest {
            folder: self.packages_folder.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            include_prerelease: self.include_prerelease,
            feed: self.feed.clone(),
            include_secondary_feeds: self.options.include_secondary_feeds,
            target_framework: self.options.target_framework.clone(),
            auto_retry: self.options.auto_retry,
        }
    }
}

#[async_trait]
impl ModuleCatalog for PackageCatalog {
    async fn initialize(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(&self.packages_folder).await?;

        let manifest = match self.cached_manifest().await {
            Some(manifest) => manifest,
            None => self.client.download(&self.download_request()).await?,
        };

        let load_context = self
            .options
            .load_context
            .clone()
            .with_runtime_hints(manifest.recommended_hints());

        let mut seen = HashSet::new();
        let mut catalogs = Vec::new();
        for file in &manifest.module_binary_files {
            let path = self.packages_folder.join(file);
            if !seen.insert(path.clone()) {
                continue;
            }

            let options = BinaryCatalogOptions {
                naming: self.options.naming.clone(),
                finder: self.options.finder.clone(),
                load_context: load_context.clone(),
            };
            let mut catalog = BinaryCatalog::from_path(path, options);
            catalog.initialize().await?;
            catalogs.push(catalog);
        }

        self.catalogs = catalogs;
        self.initialized = true;

        if self.force_package_cache() {
            let path = self.manifest_path();
            match manifest.write(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Stored package manifest"),
                Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to store package manifest"),
            }
        }

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

impl std::fmt::Debug for PackageCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageCatalog")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("packages_folder", &self.packages_folder)
            .field("catalogs", &self.catalogs.len())
            .field("initialized", &self.initialized)
            .finish()
    }
}
