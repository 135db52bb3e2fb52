//! The compiler collaborator and the built-in metadata compiler.
//!
//! A [`Compiler`] turns source text into a loadable [`Binary`].
//! [`MetadataCompiler`] parses declaration source and records the declared
//! types, their signatures and their trait implementations; it does not
//! produce executable code.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use modaularity_core::naming::DEFAULT_VERSION;
use modaularity_core::{
    Binary, BinaryImage, MethodSignature, ModuleError, ParameterSignature, PropertySignature, Result,
    TypeDescriptor, TypeRef,
};

use crate::syntax::ast::{FnDecl, ImplBlock, Item, StructKind, TraitDecl};
use crate::syntax::parse_file;

/// Compiles source text against referenced binaries.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Any parse, semantic or compile failure is an `InvalidSource` error.
    async fn generate_binary(&self, source: &str, references: &[Arc<Binary>]) -> Result<Arc<Binary>>;
}

/// Name given to every generated binary: `Generated_<uuid>`.
pub fn generated_binary_name() -> String {
    format!("Generated_{}", uuid::Uuid::new_v4().simple())
}

/// Compiles declaration source into type metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataCompiler;

impl MetadataCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous form of [`Compiler::generate_binary`].
    pub fn compile(&self, source: &str, references: &[Arc<Binary>]) -> Result<Binary> {
        let file = parse_file(source).map_err(|e| ModuleError::invalid_source(format!("syntax error: {}", e), source))?;

        let name = generated_binary_name();
        let mut unit = Unit::new(&name, references);
        unit.declare(&file.items, &[]).map_err(|e| ModuleError::invalid_source(e, source))?;
        unit.link().map_err(|e| ModuleError::invalid_source(e, source))?;

        let descriptors = unit.descriptors;
        tracing::debug!(types = descriptors.len(), references = references.len(), "Compiled declaration source");
        let mut image = BinaryImage::builder(name).with_version(DEFAULT_VERSION);
        for descriptor in descriptors {
            image = image.with_type(descriptor);
        }
        Ok(Binary::from_image(image.build(), None, None))
    }
}

#[async_trait]
impl Compiler for MetadataCompiler {
    async fn generate_binary(&self, source: &str, references: &[Arc<Binary>]) -> Result<Arc<Binary>> {
        self.compile(source, references).map(Arc::new)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Concrete,
    Trait,
}

/// Declarations of one compilation, collected before linking.
struct Unit<'a> {
    binary_name: &'a str,
    references: &'a [Arc<Binary>],
    descriptors: Vec<TypeDescriptor>,
    /// Full name to index into `descriptors`.
    index: HashMap<String, (usize, Kind)>,
    /// `use` aliases per namespace: short name to full path.
    aliases: HashMap<String, HashMap<String, Vec<String>>>,
    traits: Vec<(Vec<String>, &'a TraitDecl)>,
    impls: Vec<(Vec<String>, &'a ImplBlock)>,
}

impl<'a> Unit<'a> {
    fn new(binary_name: &'a str, references: &'a [Arc<Binary>]) -> Self {
        Self {
            binary_name,
            references,
            descriptors: Vec::new(),
            index: HashMap::new(),
            aliases: HashMap::new(),
            traits: Vec::new(),
            impls: Vec::new(),
        }
    }

    fn declare(&mut self, items: &'a [Item], namespace: &[String]) -> std::result::Result<(), String> {
        for item in items {
            match item {
                Item::Use(path) => {
                    if let Some(last) = path.last().filter(|last| last.as_str() != "self" && last.as_str() != "*") {
                        self.aliases
                            .entry(namespace.join("::"))
                            .or_default()
                            .insert(last.clone(), path.clone());
                    }
                }
                Item::Mod { name, items } => {
                    let mut inner = namespace.to_vec();
                    inner.push(name.clone());
                    self.declare(items, &inner)?;
                }
                Item::Struct(decl) => {
                    let mut descriptor = TypeDescriptor::new(namespace.join("::"), decl.name.clone());
                    if let StructKind::Named(fields) = &decl.kind {
                        for field in fields.iter().filter(|field| field.is_public) {
                            descriptor = descriptor.with_property(PropertySignature::new(field.name.clone(), field.ty.to_string()));
                        }
                    }
                    let descriptor = finish(descriptor, decl.is_public, &decl.attributes);
                    self.insert(descriptor, Kind::Concrete)?;
                }
                Item::Enum(decl) => {
                    let descriptor = TypeDescriptor::new(namespace.join("::"), decl.name.clone());
                    let descriptor = finish(descriptor, decl.is_public, &decl.attributes);
                    self.insert(descriptor, Kind::Concrete)?;
                }
                Item::Trait(decl) => {
                    let mut descriptor = TypeDescriptor::new(namespace.join("::"), decl.name.clone()).interface();
                    for method in &decl.methods {
                        descriptor = descriptor.with_method(method_signature(method));
                    }
                    let descriptor = finish(descriptor, decl.is_public, &decl.attributes);
                    self.insert(descriptor, Kind::Trait)?;
                    self.traits.push((namespace.to_vec(), decl));
                }
                Item::Impl(block) => self.impls.push((namespace.to_vec(), block)),
                Item::Fn(_) => {}
            }
        }
        Ok(())
    }

    fn insert(&mut self, descriptor: TypeDescriptor, kind: Kind) -> std::result::Result<(), String> {
        let full_name = descriptor.full_name();
        if self.index.contains_key(&full_name) {
            return Err(format!("the name `{}` is defined multiple times", full_name));
        }
        self.index.insert(full_name, (self.descriptors.len(), kind));
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Resolve supertraits and impl blocks now that every type is declared.
    fn link(&mut self) -> std::result::Result<(), String> {
        let traits = std::mem::take(&mut self.traits);
        for (namespace, decl) in traits {
            let own = self.local(&namespace, &[decl.name.clone()]).map(|(index, _)| index);
            for supertrait in &decl.supertraits {
                let parent = self.resolve_trait(&namespace, supertrait)?;
                if let Some(index) = own {
                    self.descriptors[index].interfaces.push(parent);
                }
            }
        }

        let impls = std::mem::take(&mut self.impls);
        for (namespace, block) in impls {
            let (index, kind) = self
                .local(&namespace, &block.self_path)
                .ok_or_else(|| format!("cannot find type `{}` in this scope", block.self_path.join("::")))?;
            if kind == Kind::Trait {
                return Err(format!("`{}` is a trait and cannot be implemented on", block.self_path.join("::")));
            }

            match &block.trait_path {
                Some(trait_path) => {
                    let interface = self.resolve_trait(&namespace, trait_path)?;
                    let descriptor = &mut self.descriptors[index];
                    if !descriptor.interfaces.contains(&interface) {
                        descriptor.interfaces.push(interface);
                    }
                    for function in &block.functions {
                        descriptor.methods.push(method_signature(function));
                    }
                }
                None => {
                    let descriptor = &mut self.descriptors[index];
                    for function in block.functions.iter().filter(|function| function.is_public) {
                        if function.name == "new" && function.receiver.is_none() {
                            descriptor.constructor = function
                                .params
                                .iter()
                                .map(|param| ParameterSignature::new(param.name.clone(), param.ty.to_string()))
                                .collect();
                        } else {
                            descriptor.methods.push(method_signature(function));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Candidate full names for `path` written inside `namespace`.
    fn candidates(&self, namespace: &[String], path: &[String]) -> Vec<String> {
        if let Some(qualified) = qualify(namespace, path) {
            return vec![qualified];
        }
        let Some(first) = path.first() else {
            return Vec::new();
        };

        let mut candidates = vec![namespace.iter().chain(path).cloned().collect::<Vec<_>>().join("::")];
        if let Some(target) = self.aliases.get(&namespace.join("::")).and_then(|aliases| aliases.get(first)) {
            let resolved: Vec<String> = target.iter().chain(&path[1..]).cloned().collect();
            candidates.push(qualify(&[], &resolved).unwrap_or_else(|| resolved.join("::")));
        }
        candidates.push(path.join("::"));
        candidates
    }

    fn local(&self, namespace: &[String], path: &[String]) -> Option<(usize, Kind)> {
        self.candidates(namespace, path)
            .iter()
            .find_map(|candidate| self.index.get(candidate).copied())
    }

    fn resolve_trait(&self, namespace: &[String], path: &[String]) -> std::result::Result<TypeRef, String> {
        let display = path.join("::");
        if let Some((index, kind)) = self.local(namespace, path) {
            if kind != Kind::Trait {
                return Err(format!("expected trait, found type `{}`", display));
            }
            return Ok(TypeRef::new(self.binary_name, self.descriptors[index].full_name()));
        }

        let candidates = self.candidates(namespace, path);
        let short = path.last().cloned().unwrap_or_default();
        let referenced = self.references.iter().find_map(|binary| {
            binary
                .types()
                .iter()
                .filter(|descriptor| descriptor.is_public)
                .find(|descriptor| {
                    let full_name = descriptor.full_name();
                    candidates.contains(&full_name) || (path.len() == 1 && descriptor.name == short)
                })
                .map(|descriptor| (binary, descriptor))
        });

        match referenced {
            Some((binary, descriptor)) if descriptor.is_interface => Ok(TypeRef::new(binary.name(), descriptor.full_name())),
            Some(_) => Err(format!("expected trait, found type `{}`", display)),
            None => Err(format!("cannot find trait `{}` in this scope", display)),
        }
    }
}

/// Full name of a `crate::`, `self::` or `super::` path.
fn qualify(namespace: &[String], path: &[String]) -> Option<String> {
    let join = |base: &[String], rest: &[String]| base.iter().chain(rest).cloned().collect::<Vec<_>>().join("::");
    match path.first().map(String::as_str) {
        Some("crate") => Some(path[1..].join("::")),
        Some("self") => Some(join(namespace, &path[1..])),
        Some("super") => {
            let mut base = namespace.to_vec();
            let mut rest = path;
            while rest.first().map(String::as_str) == Some("super") {
                base.pop();
                rest = &rest[1..];
            }
            Some(join(&base, rest))
        }
        _ => None,
    }
}

fn finish(mut descriptor: TypeDescriptor, is_public: bool, attributes: &[crate::syntax::ast::Attribute]) -> TypeDescriptor {
    if !is_public {
        descriptor = descriptor.private();
    }
    for attribute in attributes {
        descriptor = descriptor.with_attribute(attribute.full_name());
    }
    descriptor
}

fn method_signature(function: &FnDecl) -> MethodSignature {
    let mut method = MethodSignature::new(function.name.clone());
    for param in &function.params {
        method = method.with_parameter(param.name.clone(), param.ty.to_string());
    }
    if let Some(ret) = function.ret.as_ref().filter(|ret| !ret.is_unit()) {
        method = method.with_return_type(ret.to_string());
    }
    if function.is_async {
        method = method.asynchronous();
    }
    method
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Result<Binary> {
        MetadataCompiler::new().compile(source, &[])
    }

    #[test]
    fn test_declarations_become_descriptors() {
        let binary = compile(
            r#"
            mod shapes {
                #[derive(Debug)]
                pub struct Circle {
                    pub radius: f64,
                    id: u32,
                }

                struct Hidden;

                pub enum Unit { Metric, Imperial }

                impl Circle {
                    pub fn new(radius: f64) -> Self { Self::with_radius(radius) }
                    pub fn area(&self) -> f64 { self.radius * self.radius * 3.14 }
                    fn helper(&self) {}
                }
            }
            "#,
        )
        .unwrap();

        assert!(binary.name().starts_with("Generated_"));
        let circle = binary.find_type("shapes::Circle").unwrap();
        assert!(circle.has_attribute("derive"));
        assert_eq!(circle.properties, vec![PropertySignature::new("radius", "f64")]);
        assert_eq!(circle.constructor, vec![ParameterSignature::new("radius", "f64")]);
        assert_eq!(circle.methods, vec![MethodSignature::new("area").with_return_type("f64")]);
        assert!(!binary.find_type("shapes::Hidden").unwrap().is_public);
        assert!(binary.find_type("shapes::Unit").is_some());
    }

    #[test]
    fn test_trait_impls_resolve_paths() {
        let binary = compile(
            r#"
            pub trait Named { fn name(&self) -> String; }

            mod plugins {
                pub trait Runner: super::Named { async fn run(&self, input: i32); }

                pub struct Echo;

                impl crate::Named for Echo {
                    fn name(&self) -> String { String::from("echo") }
                }

                impl Runner for Echo {
                    async fn run(&self, input: i32) {}
                }
            }
            "#,
        )
        .unwrap();

        let runner = binary.find_type("plugins::Runner").unwrap();
        assert!(runner.is_interface);
        assert_eq!(runner.interfaces, vec![TypeRef::new(binary.name(), "Named")]);

        let echo = binary.find_type("plugins::Echo").unwrap();
        assert_eq!(
            echo.interfaces,
            vec![TypeRef::new(binary.name(), "Named"), TypeRef::new(binary.name(), "plugins::Runner")]
        );
        assert_eq!(echo.methods.len(), 2);
        assert!(echo.methods[1].is_async);
    }

    #[test]
    fn test_traits_from_references() {
        let contracts = Arc::new(Binary::from_image(
            BinaryImage::builder("Contracts")
                .with_type(TypeDescriptor::new("contracts", "Plugin").interface())
                .with_type(TypeDescriptor::new("contracts", "Config"))
                .build(),
            None,
            None,
        ));
        let references = [contracts];
        let compiler = MetadataCompiler::new();

        let binary = compiler
            .compile("use contracts::Plugin; pub struct A; impl Plugin for A {}", &references)
            .unwrap();
        assert_eq!(
            binary.find_type("A").unwrap().interfaces,
            vec![TypeRef::new("Contracts", "contracts::Plugin")]
        );

        let err = compiler
            .compile("pub struct A; impl contracts::Config for A {}", &references)
            .unwrap_err();
        assert!(err.to_string().contains("expected trait"));
    }

    #[test]
    fn test_semantic_errors_are_invalid_source() {
        let cases = [
            "pub struct A; impl Missing for A {}",
            "pub struct A; pub struct A;",
            "impl Nowhere { }",
            "pub struct A; pub struct B; impl A for B {}",
            "pub struct {",
        ];
        for source in cases {
            match compile(source) {
                Err(ModuleError::InvalidSource { source_text, .. }) => assert_eq!(source_text, source),
                other => panic!("expected an invalid source error for {:?}, got {:?}", source, other),
            }
        }
    }
}
