//! Module catalogs over generated code.
//!
//! [`GeneratedCatalog`] compiles source text, either declarations or a
//! script wrapped into a single method. [`DelegateCatalog`] synthesizes a
//! type around a [`Callable`]. Both hand the source to a [`Compiler`]; the
//! built-in [`MetadataCompiler`] records type metadata only.

pub mod compiler;
pub mod delegate;
pub mod generated;
pub mod script;
pub mod syntax;
pub mod wrapper;

pub use compiler::{Compiler, MetadataCompiler};
pub use delegate::{
    route_parameters, Callable, ConversionRule, DelegateCatalog, DelegateCatalogOptions, ParameterConversion,
    ParameterInfo, ParameterRoute, RoutedParameter, RoutedParameters,
};
pub use generated::{GeneratedCatalog, GeneratedCatalogOptions, DEFAULT_MODULE_NAME};
pub use script::{KnownTypes, ScriptAnalysis};
pub use syntax::{classify, SourceKind, SyntaxError};
pub use wrapper::{WrapperNames, DEFAULT_METHOD_NAME, DEFAULT_NAMESPACE, DEFAULT_TYPE_NAME};
