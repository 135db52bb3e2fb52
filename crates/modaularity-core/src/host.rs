//! The hosting application's own binaries.
//!
//! [`HostEnvironment`] plays the role of the process-wide default load
//! context: binaries it has loaded are shared with every loading context whose
//! policy allows it. It is always passed explicitly; there is no global
//! instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::binary::{binary_file_name, Binary, BinaryImage};
use crate::error::Result;

/// Binaries available to the host application.
#[derive(Debug)]
pub struct HostEnvironment {
    /// Application base directory, probed for binaries on demand.
    base_dir: PathBuf,
    /// Directory of runtime-provided binaries.
    runtime_dir: Option<PathBuf>,
    /// Binaries loaded by the host, in load order.
    loaded: RwLock<Vec<Arc<Binary>>>,
}

impl HostEnvironment {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            runtime_dir: None,
            loaded: RwLock::new(Vec::new()),
        }
    }

    /// Host rooted at the current working directory.
    pub fn current() -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(base_dir)
    }

    pub fn with_runtime_dir(mut self, runtime_dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = Some(runtime_dir.into());
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn runtime_dir(&self) -> Option<&Path> {
        self.runtime_dir.as_deref()
    }

    /// Register an already materialized binary as host-loaded.
    pub fn register(&self, binary: Binary) -> Arc<Binary> {
        let binary = Arc::new(binary);
        self.loaded.write().push(Arc::clone(&binary));
        binary
    }

    /// Load a binary file into the host.
    pub fn load_from_path(&self, path: &Path) -> Result<Arc<Binary>> {
        if let Some(existing) = self
            .loaded
            .read()
            .iter()
            .find(|binary| binary.path() == Some(path))
        {
            return Ok(Arc::clone(existing));
        }

        let image = BinaryImage::read(path)?;
        tracing::debug!(binary = %image.name, path = %path.display(), "Host loaded binary");
        Ok(self.register(Binary::from_image(image, Some(path.to_path_buf()), None)))
    }

    /// A binary the host has already loaded, by case-insensitive name.
    pub fn loaded(&self, name: &str) -> Option<Arc<Binary>> {
        self.loaded
            .read()
            .iter()
            .find(|binary| binary.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Satisfy a request from the host: already loaded, or found in the base
    /// directory.
    pub fn try_load(&self, name: &str) -> Option<Arc<Binary>> {
        if let Some(binary) = self.loaded(name) {
            return Some(binary);
        }

        let candidate = self.base_dir.join(binary_file_name(name));
        if !candidate.is_file() {
            return None;
        }

        match self.load_from_path(&candidate) {
            Ok(binary) => Some(binary),
            Err(e) => {
                tracing::debug!(binary = name, error = %e, "Host could not load binary");
                None
            }
        }
    }

    /// All binaries loaded so far.
    pub fn binaries(&self) -> Vec<Arc<Binary>> {
        self.loaded.read().clone()
    }

    /// Distinct directories holding host-loaded binaries.
    pub fn framework_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for binary in self.loaded.read().iter() {
            if let Some(dir) = binary.path().and_then(Path::parent) {
                if !dirs.iter().any(|known| known == dir) {
                    dirs.push(dir.to_path_buf());
                }
            }
        }
        dirs
    }
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::TypeDescriptor;

    #[test]
    fn test_try_load_probes_base_dir_once() {
        let dir = tempfile::tempdir().unwrap();
        BinaryImage::builder("Shared")
            .with_type(TypeDescriptor::new("shared", "Contract").interface())
            .build()
            .write_to(&dir.path().join("Shared.modb"))
            .unwrap();

        let host = HostEnvironment::new(dir.path());
        assert!(host.loaded("Shared").is_none());

        let first = host.try_load("shared").unwrap();
        let second = host.try_load("Shared").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(host.binaries().len(), 1);
        assert_eq!(host.framework_dirs(), vec![dir.path().to_path_buf()]);
        assert!(host.try_load("Missing").is_none());
    }

    #[test]
    fn test_registered_binaries_are_visible() {
        let host = HostEnvironment::new("/nonexistent");
        host.register(Binary::from_image(BinaryImage::builder("InMemory").build(), None, None));
        assert!(host.try_load("inmemory").is_some());
        assert!(host.framework_dirs().is_empty());
    }
}
