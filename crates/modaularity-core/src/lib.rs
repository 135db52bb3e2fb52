//! Core of the Modaularity module discovery framework.
//!
//! Modules are types that satisfy caller-supplied criteria. They are found
//! in binaries, directories of binaries, or any other source implementing
//! [`ModuleCatalog`], and every binary given by path is loaded into its own
//! isolated [`LoadContext`].

pub mod binary;
pub mod catalog;
pub mod config;
pub mod context;
pub mod criteria;
pub mod error;
pub mod fs;
pub mod host;
pub mod module;
pub mod naming;
pub mod resolver;

pub use binary::{
    Binary, BinaryImage, BinaryImageBuilder, DependencyEntry, MethodSignature, ModuleType,
    ParameterSignature, PropertySignature, TypeDescriptor, TypeRef,
};
pub use catalog::{
    BinaryCatalog, BinaryCatalogOptions, CatalogDefaults, CompositeCatalog, DirectoryCatalog,
    DirectoryCatalogOptions, EmptyCatalog, ModuleCatalog, ModuleCatalogExt, TypeCatalog,
    TypeCatalogOptions,
};
pub use config::{CatalogConfigLoader, CatalogConfiguration, CatalogConverter, ConverterRegistry};
pub use context::{
    HostBinaryPolicy, LoadContext, LoadContextOptions, MetadataContext, ResolutionSource,
    RuntimeHint,
};
pub use criteria::{Criteria, CriteriaBuilder, FinderOptions, TypeFinder};
pub use error::{ModuleError, Result};
pub use host::HostEnvironment;
pub use module::{CatalogId, Module};
pub use naming::NamingOptions;
pub use resolver::{BinaryScope, TypeResolver};

/// Re-exports commonly used types.
pub mod prelude {
    // Catalogs
    pub use crate::catalog::{
        BinaryCatalog, BinaryCatalogOptions, CatalogDefaults, CompositeCatalog, DirectoryCatalog,
        DirectoryCatalogOptions, ModuleCatalog, ModuleCatalogExt, TypeCatalog,
    };

    // Criteria
    pub use crate::criteria::{Criteria, CriteriaBuilder, FinderOptions};

    // Loading
    pub use crate::context::{HostBinaryPolicy, LoadContextOptions, RuntimeHint};
    pub use crate::host::HostEnvironment;

    // Error handling
    pub use crate::error::{ModuleError, Result};

    pub use crate::binary::{ModuleType, TypeRef};
    pub use crate::module::Module;
    pub use crate::naming::NamingOptions;
}
