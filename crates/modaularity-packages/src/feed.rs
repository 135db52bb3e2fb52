//! Catalog over every package a feed search returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use modaularity_core::{Module, ModuleCatalog, Result};

use crate::client::{PackageClient, PackageFeed};
use crate::package::{PackageCatalog, PackageCatalogOptions};

/// Default bound on the number of packages taken from a search.
pub const DEFAULT_MAX_PACKAGES: usize = 128;

/// Modules from the packages matching a feed search.
pub struct FeedCatalog {
    client: Arc<dyn PackageClient>,
    feed: PackageFeed,
    search_term: Option<String>,
    include_prerelease: bool,
    max_packages: usize,
    packages_folder: PathBuf,
    options: PackageCatalogOptions,
    catalogs: Vec<PackageCatalog>,
    initialized: bool,
}

impl FeedCatalog {
    pub fn new(
        client: Arc<dyn PackageClient>,
        feed: PackageFeed,
        search_term: Option<String>,
        packages_folder: Option<PathBuf>,
        options: PackageCatalogOptions,
    ) -> Self {
        let packages_folder = packages_folder
            .or_else(|| options.custom_packages_folder.clone())
            .unwrap_or_else(|| {
                std::env::temp_dir()
                    .join("FeedModuleCatalog")
                    .join(uuid::Uuid::new_v4().to_string())
            });

        Self {
            client,
            feed,
            search_term,
            include_prerelease: false,
            max_packages: DEFAULT_MAX_PACKAGES,
            packages_folder,
            options,
            catalogs: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_prerelease(mut self, include_prerelease: bool) -> Self {
        self.include_prerelease = include_prerelease;
        self
    }

    pub fn with_max_packages(mut self, max_packages: usize) -> Self {
        self.max_packages = max_packages;
        self
    }

    pub fn packages_folder(&self) -> &Path {
        &self.packages_folder
    }

    pub fn package_catalogs(&self) -> &[PackageCatalog] {
        &self.catalogs
    }
}

#[async_trait]
impl ModuleCatalog for FeedCatalog {
    async fn initialize(&mut self) -> Result<()> {
        let packages = self
            .client
            .search(
                &self.feed,
                self.search_term.as_deref(),
                self.max_packages,
                self.include_prerelease,
            )
            .await?;

        let mut catalogs = Vec::new();
        for package in packages.into_iter().take(self.max_packages) {
            // One folder per package keeps persisted manifests apart.
            let folder = self.packages_folder.join(format!("{}.{}", package.id, package.version));
            let mut catalog = PackageCatalog::new(
                Arc::clone(&self.client),
                package.id,
                Some(package.version),
                self.include_prerelease,
                Some(self.feed.clone()),
                Some(folder),
                self.options.clone(),
            )?;
            catalog.initialize().await?;
            catalogs.push(catalog);
        }

        tracing::info!(
            feed = %self.feed.name,
            term = ?self.search_term,
            packages = catalogs.len(),
            "Initialized feed catalog"
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
