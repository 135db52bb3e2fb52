//! Names and source layout shared by synthesized wrapper types.

use std::fmt;
use std::sync::Arc;

/// Imports placed ahead of every generated source file.
pub const STANDARD_IMPORTS: &[&str] = &[
    "std::collections::HashMap",
    "std::fmt",
    "std::sync::Arc",
];

pub const DEFAULT_NAMESPACE: &str = "GeneratedNamespace";
pub const DEFAULT_TYPE_NAME: &str = "GeneratedType";
pub const DEFAULT_METHOD_NAME: &str = "Run";

/// Computes one wrapper name from the configured names.
pub type NameGenerator = Arc<dyn Fn(&WrapperNames) -> String + Send + Sync>;

/// Namespace, type and method names of a synthesized wrapper.
///
/// Each name can be replaced by a generator; generators see the configured
/// names.
#[derive(Clone)]
pub struct WrapperNames {
    pub namespace: String,
    pub type_name: String,
    pub method: String,
    namespace_generator: Option<NameGenerator>,
    type_generator: Option<NameGenerator>,
    method_generator: Option<NameGenerator>,
}

impl Default for WrapperNames {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            type_name: DEFAULT_TYPE_NAME.to_string(),
            method: DEFAULT_METHOD_NAME.to_string(),
            namespace_generator: None,
            type_generator: None,
            method_generator: None,
        }
    }
}

impl WrapperNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_namespace_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&WrapperNames) -> String + Send + Sync + 'static,
    {
        self.namespace_generator = Some(Arc::new(generator));
        self
    }

    pub fn with_type_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&WrapperNames) -> String + Send + Sync + 'static,
    {
        self.type_generator = Some(Arc::new(generator));
        self
    }

    pub fn with_method_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&WrapperNames) -> String + Send + Sync + 'static,
    {
        self.method_generator = Some(Arc::new(generator));
        self
    }

    pub fn resolved_namespace(&self) -> String {
        match &self.namespace_generator {
            Some(generator) => generator(self),
            None => self.namespace.clone(),
        }
    }

    pub fn resolved_type_name(&self) -> String {
        match &self.type_generator {
            Some(generator) => generator(self),
            None => self.type_name.clone(),
        }
    }

    pub fn resolved_method(&self) -> String {
        match &self.method_generator {
            Some(generator) => generator(self),
            None => self.method.clone(),
        }
    }
}

impl fmt::Debug for WrapperNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperNames")
            .field("namespace", &self.resolved_namespace())
            .field("type_name", &self.resolved_type_name())
            .field("method", &self.resolved_method())
            .finish()
    }
}

/// Indentation-aware builder for generated source.
#[derive(Debug, Default)]
pub struct SourceWriter {
    out: String,
    depth: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `use` lines for the standard and `additional` imports.
    pub fn imports(&mut self, additional: &[String]) -> &mut Self {
        for import in STANDARD_IMPORTS.iter().copied().chain(additional.iter().map(String::as_str)) {
            self.line(format!("use {};", import.trim_end_matches(';')));
        }
        self.blank()
    }

    /// Append `text`, indenting each of its lines.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        for line in text.as_ref().lines() {
            if line.trim().is_empty() {
                self.out.push('\n');
                continue;
            }
            self.out.push_str(&"    ".repeat(self.depth));
            self.out.push_str(line.trim_end());
            self.out.push('\n');
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    /// `header {` and indent.
    pub fn open(&mut self, header: impl AsRef<str>) -> &mut Self {
        self.line(format!("{} {{", header.as_ref()));
        self.depth += 1;
        self
    }

    /// Dedent and `}`.
    pub fn close(&mut self) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.line("}")
    }

    /// Open one `mod` per segment of `namespace`, returning how many were
    /// opened.
    pub fn open_namespace(&mut self, namespace: &str) -> usize {
        let segments: Vec<&str> = namespace
            .split("::")
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect();
        for segment in &segments {
            self.open(format!("mod {}", segment));
        }
        segments.len()
    }

    pub fn finish(self) -> String {
        self.out
    }
}
