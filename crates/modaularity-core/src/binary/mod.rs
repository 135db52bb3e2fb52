//! Binary and type descriptors.
//!
//! A [`Binary`] is one loaded unit of module code. Instead of relying on
//! runtime reflection, every binary carries explicit [`TypeDescriptor`]s that
//! describe the types it declares: names, assignability edges, attributes and
//! member signatures. Descriptors are populated once, when the binary is
//! loaded, and never change afterwards.

pub mod image;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use image::{
    binary_file_name, is_binary_file, BinaryImage, BinaryImageBuilder, BINARY_EXTENSION,
    FORMAT_VERSION, MAGIC,
};

/// Identifier of the loading context a binary was loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(uuid::Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a type declared in some binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    /// Name of the declaring binary.
    pub binary: String,
    /// Fully-qualified type name (`ns::Name`).
    pub full_name: String,
}

impl TypeRef {
    pub fn new(binary: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            full_name: full_name.into(),
        }
    }

    /// Last path segment of the full name.
    pub fn short_name(&self) -> &str {
        self.full_name
            .rsplit("::")
            .next()
            .unwrap_or(&self.full_name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.full_name, self.binary)
    }
}

/// A named, typed parameter of a constructor or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSignature {
    pub name: String,
    pub type_name: String,
}

impl ParameterSignature {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A property (public field) of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySignature {
    pub name: String,
    pub type_name: String,
    pub writable: bool,
}

impl PropertySignature {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            writable: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

/// A method signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub parameters: Vec<ParameterSignature>,
    /// `None` for methods returning nothing.
    pub return_type: Option<String>,
    pub is_async: bool,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            is_async: false,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.parameters.push(ParameterSignature::new(name, type_name));
        self
    }

    pub fn with_return_type(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = Some(type_name.into());
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }
}

/// Structural facts about one declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Namespace path, empty for root-level types.
    pub namespace: String,
    /// Short name.
    pub name: String,
    pub is_public: bool,
    pub is_abstract: bool,
    pub is_interface: bool,
    pub base_types: Vec<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    /// Full names of the attributes declared on the type.
    pub attributes: Vec<String>,
    pub display_name: Option<String>,
    pub constructor: Vec<ParameterSignature>,
    pub properties: Vec<PropertySignature>,
    pub methods: Vec<MethodSignature>,
}

impl TypeDescriptor {
    /// Create a public, concrete type descriptor.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            is_public: true,
            is_abstract: false,
            is_interface: false,
            base_types: Vec::new(),
            interfaces: Vec::new(),
            attributes: Vec::new(),
            display_name: None,
            constructor: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Fully-qualified name (`ns::Name`, or `Name` without a namespace).
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace, self.name)
        }
    }

    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark as an interface. Interfaces are abstract as well.
    pub fn interface(mut self) -> Self {
        self.is_interface = true;
        self.is_abstract = true;
        self
    }

    pub fn with_base(mut self, base: TypeRef) -> Self {
        self.base_types.push(base);
        self
    }

    pub fn with_interface(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_constructor_parameter(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.constructor.push(ParameterSignature::new(name, type_name));
        self
    }

    pub fn with_property(mut self, property: PropertySignature) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_method(mut self, method: MethodSignature) -> Self {
        self.methods.push(method);
        self
    }

    /// Whether an attribute with the given full name is declared, ignoring case.
    pub fn has_attribute(&self, full_name: &str) -> bool {
        self.attributes
            .iter()
            .any(|attribute| attribute.eq_ignore_ascii_case(full_name))
    }
}

/// One entry of a binary's declared dependency closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// Dependency name (binary name, or native library file name).
    pub name: String,
    /// Location relative to the declaring binary's directory.
    pub path: String,
    pub is_native: bool,
}

impl DependencyEntry {
    pub fn binary(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_native: false,
        }
    }

    pub fn native(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_native: true,
        }
    }
}

/// A loaded module binary.
#[derive(Debug)]
pub struct Binary {
    name: String,
    version: Option<semver::Version>,
    description: Option<String>,
    product_version: Option<String>,
    path: Option<PathBuf>,
    types: Vec<Arc<TypeDescriptor>>,
    dependencies: Vec<DependencyEntry>,
    context: Option<ContextId>,
}

impl Binary {
    /// Materialize a binary from its decoded image.
    pub fn from_image(image: BinaryImage, path: Option<PathBuf>, context: Option<ContextId>) -> Self {
        Self {
            name: image.name,
            version: image.version,
            description: image.description,
            product_version: image.product_version,
            path,
            types: image.types.into_iter().map(Arc::new).collect(),
            dependencies: image.dependencies,
            context,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File version recorded in the binary, if any.
    pub fn version(&self) -> Option<&semver::Version> {
        self.version.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn product_version(&self) -> Option<&str> {
        self.product_version.as_deref()
    }

    /// Location on disk; `None` for generated or in-memory binaries.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn dependencies(&self) -> &[DependencyEntry] {
        &self.dependencies
    }

    /// Loading context that owns this binary; `None` for host binaries.
    pub fn context(&self) -> Option<ContextId> {
        self.context
    }

    /// Every declared type, public or not.
    pub fn types(&self) -> &[Arc<TypeDescriptor>] {
        &self.types
    }

    /// Look up a declared type by its full name.
    pub fn find_type(&self, full_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types
            .iter()
            .find(|descriptor| descriptor.full_name() == full_name)
            .cloned()
    }

    /// Publicly exported types, in declaration order.
    pub fn exported_types(self: &Arc<Self>) -> Vec<ModuleType> {
        self.types
            .iter()
            .filter(|descriptor| descriptor.is_public)
            .map(|descriptor| ModuleType::new(Arc::clone(self), Arc::clone(descriptor)))
            .collect()
    }

    /// Conventional file name for this binary.
    pub fn file_name(&self) -> String {
        binary_file_name(&self.name)
    }
}

/// A type together with the binary that declares it.
#[derive(Clone)]
pub struct ModuleType {
    binary: Arc<Binary>,
    descriptor: Arc<TypeDescriptor>,
}

impl ModuleType {
    pub fn new(binary: Arc<Binary>, descriptor: Arc<TypeDescriptor>) -> Self {
        Self { binary, descriptor }
    }

    pub fn binary(&self) -> &Arc<Binary> {
        &self.binary
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn full_name(&self) -> String {
        self.descriptor.full_name()
    }

    /// Reference to this type suitable for criteria.
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.binary.name(), self.full_name())
    }

    /// Same declaration in the same loaded binary instance.
    pub fn is_same(&self, other: &ModuleType) -> bool {
        Arc::ptr_eq(&self.binary, &other.binary)
            && self.descriptor.full_name() == other.descriptor.full_name()
    }
}

impl PartialEq for ModuleType {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl fmt::Debug for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleType")
            .field("binary", &self.binary.name())
            .field("type", &self.full_name())
            .finish()
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}
