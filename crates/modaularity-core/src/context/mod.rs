//! Isolated loading contexts.
//!
//! A [`LoadContext`] owns one physically loaded module binary and every
//! dependency it resolves on that binary's behalf. Two modules depending on
//! different versions of the same library each get their own copy, while the
//! host's binaries can still be shared when the [`HostBinaryPolicy`] allows.
//!
//! Resolution order for a requested binary name:
//!
//! 1. the host, when the policy is `Always` or the name is selected;
//! 2. a non-native runtime hint whose file name matches exactly;
//! 3. the module's own declared dependency closure;
//! 4. the host again, under `PreferModule`;
//! 5. each additional runtime path, searched recursively;
//!
//! and otherwise the request is reported as unresolved.

pub mod metadata;
pub mod options;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::binary::{binary_file_name, Binary, BinaryImage, ContextId};
use crate::error::{ModuleError, Result};
use crate::fs::find_file;
use crate::resolver::TypeResolver;

pub use metadata::MetadataContext;
pub use options::{HostBinaryPolicy, LoadContextOptions, RuntimeHint};

/// Where a resolved binary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// The context's own main binary.
    Primary,
    /// Shared with the host.
    Host,
    /// Loaded from a runtime hint.
    Hint,
    /// Loaded from the module's dependency closure.
    Closure,
    /// Found under an additional runtime path.
    RuntimePath,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub binary: Arc<Binary>,
    pub source: ResolutionSource,
}

/// Per-binary dependency resolution boundary.
pub struct LoadContext {
    id: ContextId,
    binary_path: PathBuf,
    options: LoadContextOptions,
    main: RwLock<Option<Arc<Binary>>>,
    /// Resolved binaries keyed by lowercase name.
    resolved: RwLock<HashMap<String, Resolved>>,
    natives: Mutex<Vec<(String, libloading::Library)>>,
    span: OnceCell<tracing::Span>,
}

impl LoadContext {
    pub fn new(binary_path: impl Into<PathBuf>, options: LoadContextOptions) -> Self {
        Self {
            id: ContextId::new(),
            binary_path: binary_path.into(),
            options,
            main: RwLock::new(None),
            resolved: RwLock::new(HashMap::new()),
            natives: Mutex::new(Vec::new()),
            span: OnceCell::new(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn options(&self) -> &LoadContextOptions {
        &self.options
    }

    /// Span every resolution of this context is recorded under.
    ///
    /// Built on first use; concurrent first callers observe the same span.
    pub fn span(&self) -> &tracing::Span {
        self.span.get_or_init(|| {
            tracing::debug_span!(
                "load_context",
                context = %self.id,
                binary = %self.binary_path.display(),
            )
        })
    }

    /// Load the main binary into this context.
    ///
    /// Loading twice returns the already loaded binary.
    pub fn load(&self) -> Result<Arc<Binary>> {
        if let Some(main) = self.main.read().as_ref() {
            return Ok(Arc::clone(main));
        }

        let _entered = self.span().enter();
        let image = BinaryImage::read(&self.binary_path)?;
        let binary = Arc::new(Binary::from_image(
            image,
            Some(self.binary_path.clone()),
            Some(self.id),
        ));

        let mut main = self.main.write();
        if let Some(existing) = main.as_ref() {
            return Ok(Arc::clone(existing));
        }
        *main = Some(Arc::clone(&binary));
        tracing::debug!(binary = %binary.name(), "Loaded main binary");
        Ok(binary)
    }

    /// The main binary, once loaded.
    pub fn main_binary(&self) -> Option<Arc<Binary>> {
        self.main.read().clone()
    }

    /// Resolve a dependency by binary name.
    ///
    /// `Ok(None)` means nothing could satisfy the request; the failure only
    /// matters once something actually needs the dependency.
    pub fn resolve(&self, name: &str) -> Result<Option<Resolved>> {
        let main = self.main_binary();
        if let Some(main) = main.as_ref() {
            if main.name().eq_ignore_ascii_case(name) {
                return Ok(Some(Resolved {
                    binary: Arc::clone(main),
                    source: ResolutionSource::Primary,
                }));
            }
        }

        let key = name.to_ascii_lowercase();
        if let Some(resolved) = self.resolved.read().get(&key) {
            return Ok(Some(resolved.clone()));
        }

        let _entered = self.span().enter();
        let resolved = match self.resolve_uncached(name, main.as_deref())? {
            Some(resolved) => resolved,
            None => {
                tracing::warn!(dependency = name, policy = ?self.options.policy, "Dependency not resolved");
                return Ok(None);
            }
        };

        tracing::debug!(
            dependency = name,
            source = ?resolved.source,
            path = ?resolved.binary.path(),
            "Resolved dependency"
        );

        let mut cache = self.resolved.write();
        Ok(Some(cache.entry(key).or_insert(resolved).clone()))
    }

    /// The first step that names a path commits to it: a hint or closure
    /// entry whose file fails to read or decode is an error and does not
    /// fall through to the host or the additional runtime paths.
    fn resolve_uncached(&self, name: &str, main: Option<&Binary>) -> Result<Option<Resolved>> {
        if self.options.host_first(name) {
            if let Some(binary) = self.options.host.try_load(name) {
                return Ok(Some(Resolved {
                    binary,
                    source: ResolutionSource::Host,
                }));
            }
        }

        let file_name = binary_file_name(name);
        if let Some(hint) = self
            .options
            .runtime_hints
            .iter()
            .find(|hint| !hint.is_native && hint.file_name == file_name)
        {
            return self
                .load_dependency(&hint.path)
                .map(|binary| Some(Resolved { binary, source: ResolutionSource::Hint }));
        }

        if let Some(path) = main.and_then(|main| closure_path(main, name, false)) {
            return self
                .load_dependency(&path)
                .map(|binary| Some(Resolved { binary, source: ResolutionSource::Closure }));
        }

        if self.options.policy == HostBinaryPolicy::PreferModule {
            if let Some(binary) = self.options.host.try_load(name) {
                return Ok(Some(Resolved {
                    binary,
                    source: ResolutionSource::Host,
                }));
            }
        }

        for dir in &self.options.additional_runtime_paths {
            if let Some(path) = find_file(dir, &file_name) {
                return self
                    .load_dependency(&path)
                    .map(|binary| Some(Resolved { binary, source: ResolutionSource::RuntimePath }));
            }
        }

        Ok(None)
    }

    fn load_dependency(&self, path: &Path) -> Result<Arc<Binary>> {
        let image = BinaryImage::read(path)?;
        Ok(Arc::new(Binary::from_image(
            image,
            Some(path.to_path_buf()),
            Some(self.id),
        )))
    }

    /// Path of a native library, from hints then the module's closure.
    ///
    /// Host native libraries are never considered.
    pub fn resolve_native_path(&self, name: &str) -> Option<PathBuf> {
        if let Some(hint) = self
            .options
            .runtime_hints
            .iter()
            .find(|hint| hint.is_native && hint.file_name == name)
        {
            return Some(hint.path.clone());
        }

        let main = self.main_binary()?;
        closure_path(&main, name, true)
    }

    /// Load a native library into this context.
    ///
    /// Returns `Ok(false)` when the library cannot be located.
    pub fn load_native(&self, name: &str) -> Result<bool> {
        if self
            .natives
            .lock()
            .iter()
            .any(|(loaded, _)| loaded == name)
        {
            return Ok(true);
        }

        let _entered = self.span().enter();
        let Some(path) = self.resolve_native_path(name) else {
            tracing::warn!(library = name, "Native library not resolved");
            return Ok(false);
        };

        // SAFETY: the library comes from the module's declared closure or an
        // explicit hint; its initializers run as part of loading the module.
        let library = unsafe { libloading::Library::new(&path) }.map_err(|e| {
            ModuleError::InvalidBinary {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        tracing::debug!(library = name, path = %path.display(), "Loaded native library");
        self.natives.lock().push((name.to_string(), library));
        Ok(true)
    }

    /// Binaries physically loaded by this context, main binary first.
    pub fn loaded_binaries(&self) -> Vec<Arc<Binary>> {
        let mut binaries: Vec<Arc<Binary>> = self.main_binary().into_iter().collect();
        binaries.extend(
            self.resolved
                .read()
                .values()
                .filter(|resolved| resolved.source != ResolutionSource::Host)
                .map(|resolved| Arc::clone(&resolved.binary)),
        );
        binaries
    }

    /// Drop everything this context loaded.
    pub fn unload(&self) {
        let _entered = self.span().enter();
        let natives = std::mem::take(&mut *self.natives.lock());
        let resolved = std::mem::take(&mut *self.resolved.write());
        self.main.write().take();
        tracing::debug!(
            dependencies = resolved.len(),
            native_libraries = natives.len(),
            "Unloaded context"
        );
    }
}

/// Location of `name` in `binary`'s dependency closure, if present on disk.
fn closure_path(binary: &Binary, name: &str, native: bool) -> Option<PathBuf> {
    let dir = binary.path().and_then(Path::parent)?;
    binary
        .dependencies()
        .iter()
        .filter(|entry| entry.is_native == native && entry.name.eq_ignore_ascii_case(name))
        .map(|entry| dir.join(&entry.path))
        .find(|path| path.is_file())
}

impl TypeResolver for LoadContext {
    fn find_binary(&self, name: &str) -> Option<Arc<Binary>> {
        match self.resolve(name) {
            Ok(resolved) => resolved.map(|resolved| resolved.binary),
            Err(e) => {
                tracing::warn!(dependency = name, error = %e, "Dependency failed to load");
                None
            }
        }
    }
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadContext")
            .field("id", &self.id)
            .field("binary_path", &self.binary_path)
            .field("policy", &self.options.policy)
            .field("resolved", &self.resolved.read().len())
            .field("natives", &self.natives.lock().len())
            .finish()
    }
}
