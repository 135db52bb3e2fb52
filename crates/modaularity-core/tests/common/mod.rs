//! Shared fixtures: module binaries written to temporary directories.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use modaularity_core::{
    BinaryImage, DependencyEntry, HostEnvironment, LoadContextOptions, TypeDescriptor, TypeRef,
};

pub const MODULE_ATTRIBUTE: &str = "ops::Module";

/// Write `image` as `<dir>/<name>.modb`.
pub fn write_binary(dir: &Path, image: &BinaryImage) -> PathBuf {
    let path = dir.join(format!("{}.modb", image.name));
    image.write_to(&path).unwrap();
    path
}

/// Host rooted at an empty directory, so nothing leaks in from the working
/// directory.
pub fn isolated_host(root: &Path) -> Arc<HostEnvironment> {
    let base = root.join("host");
    std::fs::create_dir_all(&base).unwrap();
    Arc::new(HostEnvironment::new(base))
}

pub fn load_options(host: Arc<HostEnvironment>) -> LoadContextOptions {
    LoadContextOptions::new(host)
}

/// `Operators` 1.2.0:
///
/// | type | kind | `*Operator` | attribute |
/// |---|---|---|---|
/// | `ops::IOperator` | interface | | |
/// | `ops::OperatorBase` | abstract | | |
/// | `ops::SumOperator` | concrete | yes | yes |
/// | `ops::MinusOperator` | concrete | yes | |
/// | `ops::MultiplyOperator` | concrete | yes | yes |
/// | `ops::Formatter` | concrete | | yes |
/// | `ops::InternalOperator` | private | | |
pub fn operators_image() -> BinaryImage {
    let operator = TypeRef::new("Operators", "ops::IOperator");
    let base = TypeRef::new("Operators", "ops::OperatorBase");

    BinaryImage::builder("Operators")
        .with_version(semver::Version::new(1, 2, 0))
        .with_description("Arithmetic operators")
        .with_product_version("1.2.0-beta")
        .with_type(TypeDescriptor::new("ops", "IOperator").interface())
        .with_type(
            TypeDescriptor::new("ops", "OperatorBase")
                .abstract_type()
                .with_interface(operator.clone()),
        )
        .with_type(
            TypeDescriptor::new("ops", "SumOperator")
                .with_base(base.clone())
                .with_attribute(MODULE_ATTRIBUTE),
        )
        .with_type(TypeDescriptor::new("ops", "MinusOperator").with_base(base.clone()))
        .with_type(
            TypeDescriptor::new("ops", "MultiplyOperator")
                .with_interface(operator)
                .with_attribute(MODULE_ATTRIBUTE),
        )
        .with_type(TypeDescriptor::new("ops", "Formatter").with_attribute(MODULE_ATTRIBUTE))
        .with_type(TypeDescriptor::new("ops", "InternalOperator").private())
        .build()
}

/// `Json` binary declaring a single `json::Serializer` at `version`.
pub fn json_image(version: semver::Version) -> BinaryImage {
    BinaryImage::builder("Json")
        .with_version(version)
        .with_type(TypeDescriptor::new("json", "Serializer"))
        .build()
}

/// `Contracts` binary declaring the `contracts::IPlugin` interface.
pub fn contracts_image() -> BinaryImage {
    BinaryImage::builder("Contracts")
        .with_type(TypeDescriptor::new("contracts", "IPlugin").interface())
        .build()
}

/// A plugin binary whose closure declares `Json.modb` and `Contracts.modb`
/// next to it, and whose `plugin::Plugin` type implements
/// `contracts::IPlugin`.
pub fn plugin_image(name: &str) -> BinaryImage {
    BinaryImage::builder(name)
        .with_type(
            TypeDescriptor::new("plugin", "Plugin")
                .with_interface(TypeRef::new("Contracts", "contracts::IPlugin")),
        )
        .with_dependency(DependencyEntry::binary("Json", "Json.modb"))
        .with_dependency(DependencyEntry::binary("Contracts", "Contracts.modb"))
        .build()
}
