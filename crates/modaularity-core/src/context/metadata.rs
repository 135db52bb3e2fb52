//! Metadata-only resolution for directory pre-checks.
//!
//! Nothing is loaded into a [`LoadContext`](super::LoadContext) here: files
//! are inspected for their descriptors only, so a candidate can be evaluated
//! against criteria before committing to a real load.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::binary::{binary_file_name, Binary, BinaryImage};
use crate::resolver::TypeResolver;

/// Resolver over a fixed universe of binary files.
#[derive(Debug)]
pub struct MetadataContext {
    paths: Vec<PathBuf>,
    primary: RwLock<Option<Arc<Binary>>>,
    /// Inspected binaries keyed by lowercase file name; `None` for files that
    /// did not inspect as binaries.
    cache: RwLock<HashMap<String, Option<Arc<Binary>>>>,
}

impl MetadataContext {
    /// Build a context over `paths`.
    ///
    /// Duplicate file names are collapsed, keeping the first occurrence.
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut seen_paths = HashSet::new();
        let mut seen_names = HashSet::new();
        let mut kept = Vec::new();

        for path in paths {
            if !seen_paths.insert(path.clone()) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !seen_names.insert(file_name.to_ascii_lowercase()) {
                tracing::trace!(path = %path.display(), "Skipping duplicate file name in metadata universe");
                continue;
            }
            kept.push(path);
        }

        Self {
            paths: kept,
            primary: RwLock::new(None),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The collapsed universe.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Register the candidate being evaluated.
    pub fn add_primary(&self, image: BinaryImage, path: PathBuf) -> Arc<Binary> {
        let binary = Arc::new(Binary::from_image(image, Some(path), None));
        *self.primary.write() = Some(Arc::clone(&binary));
        binary
    }

    fn inspect(&self, file_name: &str) -> Option<Arc<Binary>> {
        let key = file_name.to_ascii_lowercase();
        if let Some(cached) = self.cache.read().get(&key) {
            return cached.clone();
        }

        let binary = self
            .paths
            .iter()
            .find(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.eq_ignore_ascii_case(file_name))
                    .unwrap_or(false)
            })
            .and_then(|path| match BinaryImage::inspect(path) {
                Ok(Some(image)) => Some(Arc::new(Binary::from_image(image, Some(path.clone()), None))),
                Ok(None) => None,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Metadata inspection failed");
                    None
                }
            });

        self.cache.write().insert(key, binary.clone());
        binary
    }
}

impl TypeResolver for MetadataContext {
    fn find_binary(&self, name: &str) -> Option<Arc<Binary>> {
        if let Some(primary) = self.primary.read().as_ref() {
            if primary.name().eq_ignore_ascii_case(name) {
                return Some(Arc::clone(primary));
            }
        }
        self.inspect(&binary_file_name(name))
    }
}
