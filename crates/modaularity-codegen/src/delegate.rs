//! Catalog over a type synthesized around a callable.
//!
//! Each parameter of the callable is routed by the first matching
//! [`ConversionRule`] to the wrapper's constructor, to a public property, or
//! (the default) to the wrapper method itself.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use modaularity_core::{
    Binary, BinaryCatalog, BinaryCatalogOptions, CatalogDefaults, CatalogId, CriteriaBuilder, FinderOptions,
    LoadContextOptions, Module, ModuleCatalog, ModuleError, NamingOptions, ParameterSignature, Result,
};
use serde_json::Value;

use crate::compiler::{Compiler, MetadataCompiler};
use crate::wrapper::{SourceWriter, WrapperNames};

pub type Invoke = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// A function of fixed arity with a declared signature.
#[derive(Clone)]
pub struct Callable {
    parameters: Vec<ParameterSignature>,
    return_type: Option<String>,
    is_async: bool,
    invoke: Invoke,
}

impl Callable {
    pub fn new<F>(invoke: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            parameters: Vec::new(),
            return_type: None,
            is_async: false,
            invoke: Arc::new(invoke),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.parameters.push(ParameterSignature::new(name, type_name));
        self
    }

    pub fn returning(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = Some(type_name.into());
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn parameters(&self) -> &[ParameterSignature] {
        &self.parameters
    }

    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Invoke with one argument per declared parameter, in order.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        if args.len() != self.parameters.len() {
            return Err(ModuleError::InvalidArgument(format!(
                "expected {} arguments, got {}",
                self.parameters.len(),
                args.len()
            )));
        }
        (self.invoke)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .field("is_async", &self.is_async)
            .finish_non_exhaustive()
    }
}

/// A callable parameter as seen by conversion rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: String,
    pub type_name: String,
    /// Zero-based position in the callable's signature.
    pub position: usize,
}

/// Where a parameter ends up on the wrapper type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterRoute {
    #[default]
    Method,
    Constructor,
    Property,
}

/// Decision of a conversion rule for one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterConversion {
    /// Replaces the parameter's name on the wrapper.
    pub name: Option<String>,
    pub route: ParameterRoute,
}

impl ParameterConversion {
    pub fn method() -> Self {
        Self::default()
    }

    pub fn constructor() -> Self {
        Self {
            name: None,
            route: ParameterRoute::Constructor,
        }
    }

    pub fn property() -> Self {
        Self {
            name: None,
            route: ParameterRoute::Property,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

type ParameterPredicate = Arc<dyn Fn(&ParameterInfo) -> bool + Send + Sync>;
type ParameterHandler = Arc<dyn Fn(&ParameterInfo) -> ParameterConversion + Send + Sync>;

/// Decides how matching parameters are routed.
#[derive(Clone)]
pub struct ConversionRule {
    can_handle: ParameterPredicate,
    handle: ParameterHandler,
}

impl ConversionRule {
    pub fn new<P, H>(can_handle: P, handle: H) -> Self
    where
        P: Fn(&ParameterInfo) -> bool + Send + Sync + 'static,
        H: Fn(&ParameterInfo) -> ParameterConversion + Send + Sync + 'static,
    {
        Self {
            can_handle: Arc::new(can_handle),
            handle: Arc::new(handle),
        }
    }

    /// Route matching parameters to the constructor.
    pub fn to_constructor<P>(can_handle: P) -> Self
    where
        P: Fn(&ParameterInfo) -> bool + Send + Sync + 'static,
    {
        Self::new(can_handle, |_| ParameterConversion::constructor())
    }

    /// Route matching parameters to public properties.
    pub fn to_property<P>(can_handle: P) -> Self
    where
        P: Fn(&ParameterInfo) -> bool + Send + Sync + 'static,
    {
        Self::new(can_handle, |_| ParameterConversion::property())
    }

    pub fn can_handle(&self, parameter: &ParameterInfo) -> bool {
        (self.can_handle)(parameter)
    }

    pub fn handle(&self, parameter: &ParameterInfo) -> ParameterConversion {
        (self.handle)(parameter)
    }
}

impl fmt::Debug for ConversionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRule").finish_non_exhaustive()
    }
}

/// One parameter after routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedParameter {
    pub position: usize,
    pub name: String,
    pub type_name: String,
}

/// Parameters grouped by route, each group in signature order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedParameters {
    pub constructor: Vec<RoutedParameter>,
    pub properties: Vec<RoutedParameter>,
    pub method: Vec<RoutedParameter>,
}

impl RoutedParameters {
    /// Every parameter, in signature order.
    pub fn in_signature_order(&self) -> Vec<&RoutedParameter> {
        let mut all: Vec<&RoutedParameter> = self
            .constructor
            .iter()
            .chain(&self.properties)
            .chain(&self.method)
            .collect();
        all.sort_by_key(|parameter| parameter.position);
        all
    }
}

/// Route `parameters`; the first rule that can handle a parameter decides.
pub fn route_parameters(parameters: &[ParameterSignature], rules: &[ConversionRule]) -> RoutedParameters {
    let mut routed = RoutedParameters::default();
    for (position, parameter) in parameters.iter().enumerate() {
        let info = ParameterInfo {
            name: parameter.name.clone(),
            type_name: parameter.type_name.clone(),
            position,
        };
        let conversion = rules
            .iter()
            .find(|rule| rule.can_handle(&info))
            .map(|rule| rule.handle(&info))
            .unwrap_or_default();

        let entry = RoutedParameter {
            position,
            name: conversion.name.unwrap_or(info.name),
            type_name: info.type_name,
        };
        match conversion.route {
            ParameterRoute::Method => routed.method.push(entry),
            ParameterRoute::Constructor => routed.constructor.push(entry),
            ParameterRoute::Property => routed.properties.push(entry),
        }
    }
    routed
}

/// Source of the wrapper type for `callable`.
pub fn wrapper_source(callable: &Callable, routed: &RoutedParameters, names: &WrapperNames) -> String {
    let type_name = names.resolved_type_name();
    let typed = |parameters: &[RoutedParameter]| -> String {
        parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.type_name))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut signature = format!(
        "pub {}fn {}(&self",
        if callable.is_async() { "async " } else { "" },
        names.resolved_method()
    );
    for parameter in &routed.method {
        signature.push_str(&format!(", {}: {}", parameter.name, parameter.type_name));
    }
    signature.push(')');
    if let Some(return_type) = callable.return_type() {
        signature.push_str(&format!(" -> {}", return_type));
    }

    let arguments: Vec<String> = routed
        .in_signature_order()
        .into_iter()
        .map(|parameter| {
            if routed.method.contains(parameter) {
                format!("Value::from({})", parameter.name)
            } else {
                format!("Value::from(self.{}.clone())", parameter.name)
            }
        })
        .collect();

    let mut writer = SourceWriter::new();
    writer.imports(&["serde_json::Value".to_string()]);
    let opened = writer.open_namespace(&names.resolved_namespace());

    writer.open(format!("pub struct {}", type_name));
    for property in &routed.properties {
        writer.line(format!("pub {}: {},", property.name, property.type_name));
    }
    for field in &routed.constructor {
        writer.line(format!("{}: {},", field.name, field.type_name));
    }
    writer.close().blank();

    writer.open(format!("impl {}", type_name));
    writer.open(format!("pub fn new({}) -> Self", typed(&routed.constructor)));
    writer.open("Self");
    for property in &routed.properties {
        writer.line(format!("{}: Default::default(),", property.name));
    }
    for field in &routed.constructor {
        writer.line(format!("{},", field.name));
    }
    writer.close().close().blank();
    writer
        .open(signature)
        .line(format!("return invoke(&[{}]);", arguments.join(", ")))
        .close()
        .close();

    for _ in 0..opened {
        writer.close();
    }
    writer.finish()
}

/// Options for [`DelegateCatalog`].
#[derive(Clone)]
pub struct DelegateCatalogOptions {
    pub names: WrapperNames,
    pub naming: NamingOptions,
    pub conversion_rules: Vec<ConversionRule>,
    pub tags: Vec<String>,
    pub compiler: Arc<dyn Compiler>,
    pub load_context: LoadContextOptions,
}

impl Default for DelegateCatalogOptions {
    fn default() -> Self {
        Self {
            names: WrapperNames::default(),
            naming: NamingOptions::default(),
            conversion_rules: Vec::new(),
            tags: Vec::new(),
            compiler: Arc::new(MetadataCompiler::new()),
            load_context: LoadContextOptions::default(),
        }
    }
}

impl DelegateCatalogOptions {
    pub fn from_defaults(defaults: &CatalogDefaults) -> Self {
        Self {
            naming: defaults.naming.clone(),
            load_context: defaults.load_context.clone(),
            ..Self::default()
        }
    }

    pub fn with_names(mut self, names: WrapperNames) -> Self {
        self.names = names;
        self
    }

    /// Name the module `name`.
    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.naming = self.naming.with_fixed_name(name);
        self
    }

    pub fn with_naming(mut self, naming: NamingOptions) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_conversion_rule(mut self, rule: ConversionRule) -> Self {
        self.conversion_rules.push(rule);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_load_context(mut self, load_context: LoadContextOptions) -> Self {
        self.load_context = load_context;
        self
    }
}

impl fmt::Debug for DelegateCatalogOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateCatalogOptions")
            .field("names", &self.names)
            .field("conversion_rules", &self.conversion_rules.len())
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// The module synthesized around one callable.
pub struct DelegateCatalog {
    id: CatalogId,
    callable: Callable,
    options: DelegateCatalogOptions,
    catalog: Option<BinaryCatalog>,
}

impl DelegateCatalog {
    /// A missing callable is an argument error.
    pub fn new(callable: Option<Callable>, options: DelegateCatalogOptions) -> Result<Self> {
        let callable = callable.ok_or_else(|| ModuleError::InvalidArgument("a callable is required".to_string()))?;
        Ok(Self {
            id: CatalogId::new(),
            callable,
            options,
            catalog: None,
        })
    }

    pub fn id(&self) -> CatalogId {
        self.id
    }

    /// The wrapped callable; the synthesized method forwards to it.
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn binary(&self) -> Option<&Arc<Binary>> {
        self.catalog.as_ref().and_then(BinaryCatalog::binary)
    }

    pub fn routed_parameters(&self) -> RoutedParameters {
        route_parameters(self.callable.parameters(), &self.options.conversion_rules)
    }
}

#[async_trait]
impl ModuleCatalog for DelegateCatalog {
    async fn initialize(&mut self) -> Result<()> {
        let routed = self.routed_parameters();
        let source = wrapper_source(&self.callable, &routed, &self.options.names);
        let references = self.options.load_context.host.binaries();

        let binary = self
            .options
            .compiler
            .generate_binary(&source, &references)
            .await
            .map_err(|e| match e {
                ModuleError::InvalidSource { message, .. } => ModuleError::invalid_source(message, source.as_str()),
                other => ModuleError::invalid_source(other.to_string(), source.as_str()),
            })?;
        tracing::debug!(
            binary = %binary.name(),
            constructor = routed.constructor.len(),
            properties = routed.properties.len(),
            method = routed.method.len(),
            "Compiled delegate wrapper"
        );

        let criteria = CriteriaBuilder::new().tags(self.options.tags.clone()).build();
        let options = BinaryCatalogOptions {
            naming: self.options.naming.clone(),
            finder: FinderOptions::new().with_criteria(criteria),
            load_context: self.options.load_context.clone(),
        };

        let mut catalog = BinaryCatalog::from_binary(binary, options);
        catalog.initialize().await?;
        self.catalog = Some(catalog);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.catalog.as_ref().is_some_and(BinaryCatalog::is_initialized)
    }

    fn modules(&self) -> Vec<Arc<Module>> {
        self.catalog.as_ref().map(BinaryCatalog::modules).unwrap_or_default()
    }

    fn get(&self, name: &str, version: &semver::Version) -> Option<Arc<Module>> {
        self.catalog.as_ref().and_then(|catalog| catalog.get(name, version))
    }
}
