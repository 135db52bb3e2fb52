//! Options controlling how a [`LoadContext`](super::LoadContext) resolves
//! dependencies.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::host::HostEnvironment;

/// Whether dependencies may be satisfied by binaries the host already has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostBinaryPolicy {
    /// Always load the module's own copy.
    Never,
    /// Use the host for binaries on the allow-list only.
    Selected,
    /// Use the host whenever it can satisfy the request.
    #[default]
    Always,
    /// Use the module's own copy first, then fall back to the host.
    PreferModule,
}

/// A file the context should load from a known location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeHint {
    /// File name matched exactly against the requested file.
    pub file_name: String,
    pub path: PathBuf,
    pub is_native: bool,
}

impl RuntimeHint {
    pub fn new(file_name: impl Into<String>, path: impl Into<PathBuf>, is_native: bool) -> Self {
        Self {
            file_name: file_name.into(),
            path: path.into(),
            is_native,
        }
    }
}

/// Loading context configuration.
#[derive(Debug, Clone)]
pub struct LoadContextOptions {
    pub policy: HostBinaryPolicy,
    /// Names the host may satisfy under [`HostBinaryPolicy::Selected`].
    pub host_binaries: Vec<String>,
    /// Directories searched recursively when nothing else resolves.
    pub additional_runtime_paths: Vec<PathBuf>,
    pub runtime_hints: Vec<RuntimeHint>,
    pub host: Arc<HostEnvironment>,
}

impl Default for LoadContextOptions {
    fn default() -> Self {
        Self::new(Arc::new(HostEnvironment::current()))
    }
}

impl LoadContextOptions {
    pub fn new(host: Arc<HostEnvironment>) -> Self {
        Self {
            policy: HostBinaryPolicy::default(),
            host_binaries: Vec::new(),
            additional_runtime_paths: Vec::new(),
            runtime_hints: Vec::new(),
            host,
        }
    }

    pub fn with_policy(mut self, policy: HostBinaryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_host_binary(mut self, name: impl Into<String>) -> Self {
        self.host_binaries.push(name.into());
        self
    }

    pub fn with_additional_runtime_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.additional_runtime_paths.push(path.into());
        self
    }

    pub fn with_runtime_hint(mut self, hint: RuntimeHint) -> Self {
        self.runtime_hints.push(hint);
        self
    }

    pub fn with_runtime_hints(mut self, hints: impl IntoIterator<Item = RuntimeHint>) -> Self {
        self.runtime_hints.extend(hints);
        self
    }

    pub fn with_host(mut self, host: Arc<HostEnvironment>) -> Self {
        self.host = host;
        self
    }

    /// Whether the host may be asked for `name` before the module's closure.
    pub(crate) fn host_first(&self, name: &str) -> bool {
        match self.policy {
            HostBinaryPolicy::Always => true,
            HostBinaryPolicy::Selected => self.is_selected(name),
            HostBinaryPolicy::Never | HostBinaryPolicy::PreferModule => false,
        }
    }

    pub(crate) fn is_selected(&self, name: &str) -> bool {
        self.host_binaries
            .iter()
            .any(|selected| selected.eq_ignore_ascii_case(name))
    }
}
