//! How modules are named and versioned.

use std::fmt;
use std::sync::Arc;

use crate::binary::ModuleType;

pub type NameGenerator = Arc<dyn Fn(&NamingOptions, &ModuleType) -> String + Send + Sync>;
pub type VersionGenerator = Arc<dyn Fn(&NamingOptions, &ModuleType) -> semver::Version + Send + Sync>;

/// Version assigned when a binary carries none.
pub const DEFAULT_VERSION: semver::Version = semver::Version::new(1, 0, 0);

/// Generators for a module's name, version, description and product version.
#[derive(Clone)]
pub struct NamingOptions {
    pub name_generator: NameGenerator,
    pub version_generator: VersionGenerator,
    pub description_generator: NameGenerator,
    pub product_version_generator: NameGenerator,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            name_generator: Arc::new(|_, ty| default_name(ty)),
            version_generator: Arc::new(|_, ty| default_version(ty)),
            description_generator: Arc::new(|_, ty| {
                ty.binary().description().unwrap_or_default().to_string()
            }),
            product_version_generator: Arc::new(|_, ty| {
                ty.binary().product_version().unwrap_or_default().to_string()
            }),
        }
    }
}

impl NamingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&NamingOptions, &ModuleType) -> String + Send + Sync + 'static,
    {
        self.name_generator = Arc::new(generator);
        self
    }

    pub fn with_version_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&NamingOptions, &ModuleType) -> semver::Version + Send + Sync + 'static,
    {
        self.version_generator = Arc::new(generator);
        self
    }

    pub fn with_description_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&NamingOptions, &ModuleType) -> String + Send + Sync + 'static,
    {
        self.description_generator = Arc::new(generator);
        self
    }

    pub fn with_product_version_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&NamingOptions, &ModuleType) -> String + Send + Sync + 'static,
    {
        self.product_version_generator = Arc::new(generator);
        self
    }

    /// Name every module `name`.
    pub fn with_fixed_name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.with_name_generator(move |_, _| name.clone())
    }

    pub fn with_fixed_version(self, version: semver::Version) -> Self {
        self.with_version_generator(move |_, _| version.clone())
    }

    pub fn with_fixed_description(self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.with_description_generator(move |_, _| description.clone())
    }

    pub fn with_fixed_product_version(self, product_version: impl Into<String>) -> Self {
        let product_version = product_version.into();
        self.with_product_version_generator(move |_, _| product_version.clone())
    }

    pub fn name(&self, ty: &ModuleType) -> String {
        (self.name_generator)(self, ty)
    }

    pub fn version(&self, ty: &ModuleType) -> semver::Version {
        (self.version_generator)(self, ty)
    }

    pub fn description(&self, ty: &ModuleType) -> String {
        (self.description_generator)(self, ty)
    }

    pub fn product_version(&self, ty: &ModuleType) -> String {
        (self.product_version_generator)(self, ty)
    }
}

impl fmt::Debug for NamingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamingOptions").finish_non_exhaustive()
    }
}

/// Display name when set and non-blank, else the full type name.
pub fn default_name(ty: &ModuleType) -> String {
    match ty.descriptor().display_name.as_deref() {
        Some(display) if !display.trim().is_empty() => display.to_string(),
        _ => ty.full_name(),
    }
}

/// The binary's version, or [`DEFAULT_VERSION`] when absent or zero.
pub fn default_version(ty: &ModuleType) -> semver::Version {
    match ty.binary().version() {
        Some(version) if *version != semver::Version::new(0, 0, 0) => version.clone(),
        _ => DEFAULT_VERSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{Binary, BinaryImage, TypeDescriptor};

    fn module_type(image: BinaryImage, full_name: &str) -> ModuleType {
        let binary = Arc::new(Binary::from_image(image, None, None));
        let descriptor = binary.find_type(full_name).unwrap();
        ModuleType::new(binary, descriptor)
    }

    #[test]
    fn test_defaults() {
        let ty = module_type(
            BinaryImage::builder("Ops")
                .with_description("Math operators")
                .with_type(TypeDescriptor::new("ops", "Sum"))
                .build(),
            "ops::Sum",
        );
        let naming = NamingOptions::default();
        assert_eq!(naming.name(&ty), "ops::Sum");
        assert_eq!(naming.version(&ty), DEFAULT_VERSION);
        assert_eq!(naming.description(&ty), "Math operators");
        assert_eq!(naming.product_version(&ty), "");
    }

    #[test]
    fn test_display_name_and_zero_version() {
        let ty = module_type(
            BinaryImage::builder("Ops")
                .with_version(semver::Version::new(0, 0, 0))
                .with_type(TypeDescriptor::new("ops", "Sum").with_display_name("Addition"))
                .with_type(TypeDescriptor::new("ops", "Blank").with_display_name("  "))
                .build(),
            "ops::Sum",
        );
        assert_eq!(default_name(&ty), "Addition");
        assert_eq!(default_version(&ty), DEFAULT_VERSION);

        let blank = ModuleType::new(
            Arc::clone(ty.binary()),
            ty.binary().find_type("ops::Blank").unwrap(),
        );
        assert_eq!(default_name(&blank), "ops::Blank");
    }

    #[test]
    fn test_fixed_overrides() {
        let ty = module_type(
            BinaryImage::builder("Ops")
                .with_version(semver::Version::new(2, 3, 0))
                .with_type(TypeDescriptor::new("ops", "Sum"))
                .build(),
            "ops::Sum",
        );
        assert_eq!(NamingOptions::default().version(&ty), semver::Version::new(2, 3, 0));

        let naming = NamingOptions::new()
            .with_fixed_name("Adder")
            .with_fixed_version(semver::Version::new(9, 0, 0))
            .with_name_generator(|options, ty| format!("{}-{}", ty.name(), options.version(ty)));
        assert_eq!(naming.name(&ty), "Sum-9.0.0");
    }
}
