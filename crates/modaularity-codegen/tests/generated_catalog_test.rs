//! Generated-code catalog tests: scripts, declarations and naming.

use std::sync::Arc;

use async_trait::async_trait;

use modaularity_codegen::{Compiler, GeneratedCatalog, GeneratedCatalogOptions, WrapperNames};
use modaularity_core::prelude::*;
use modaularity_core::{Binary, BinaryImage, TypeDescriptor, TypeRef};

fn options(root: &tempfile::TempDir) -> GeneratedCatalogOptions {
    let host = Arc::new(HostEnvironment::new(root.path()));
    GeneratedCatalogOptions::default().with_load_context(LoadContextOptions::new(host))
}

async fn initialized(code: &str, options: GeneratedCatalogOptions) -> GeneratedCatalog {
    let mut catalog = GeneratedCatalog::new(code, options).unwrap();
    catalog.initialize().await.unwrap();
    catalog
}

async fn initialize_error(code: &str, options: GeneratedCatalogOptions) -> ModuleError {
    let mut catalog = GeneratedCatalog::new(code, options).unwrap();
    let err = catalog.initialize().await.unwrap_err();
    assert!(!catalog.is_initialized());
    err
}

#[tokio::test]
async fn test_script_becomes_single_method_type() {
    let root = tempfile::tempdir().unwrap();
    let catalog = initialized("let x = 5; return x.to_string();", options(&root)).await;

    let module = catalog.single().unwrap();
    assert_eq!(module.name, "GeneratedNamespace::GeneratedType");
    assert_eq!(module.version, semver::Version::new(1, 0, 0));

    let descriptor = module.module_type.descriptor();
    assert_eq!(descriptor.methods.len(), 1);
    let method = &descriptor.methods[0];
    assert_eq!(method.name, "Run");
    assert_eq!(method.return_type.as_deref(), Some("String"));
    assert!(method.parameters.is_empty());
    assert!(method.is_async);
}

#[tokio::test]
async fn test_script_without_return_is_void() {
    let root = tempfile::tempdir().unwrap();
    let catalog = initialized(
        "println!(\"Hello world!\");",
        options(&root).with_returns_future(false),
    )
    .await;

    let module = catalog.single().unwrap();
    let method = &module.module_type.descriptor().methods[0];
    assert_eq!(method.return_type, None);
    assert!(!method.is_async);
}

#[tokio::test]
async fn test_script_params_become_method_parameters() {
    let root = tempfile::tempdir().unwrap();
    let catalog = initialized(
        "param y: i32 = 5; param x: i32 = 20; let z = y + x; return z;",
        options(&root),
    )
    .await;

    let module = catalog.single().unwrap();
    let method = &module.module_type.descriptor().methods[0];
    let parameters: Vec<(&str, &str)> = method
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.type_name.as_str()))
        .collect();
    assert_eq!(parameters, vec![("y", "i32"), ("x", "i32")]);
    assert_eq!(method.return_type.as_deref(), Some("i32"));
}

#[tokio::test]
async fn test_tuple_result_is_invalid_source() {
    let root = tempfile::tempdir().unwrap();
    let code = "let i = 15; let x = \"Hello\"; return (i, x);";

    match initialize_error(code, options(&root)).await {
        ModuleError::InvalidSource { message, source_text } => {
            assert_eq!(source_text, code);
            assert!(message.contains("(i32, &str)"), "{}", message);
        }
        other => panic!("expected an invalid source error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_custom_names_and_module_overrides() {
    let root = tempfile::tempdir().unwrap();
    let names = WrapperNames::new()
        .with_namespace("calc")
        .with_type_name("Adder")
        .with_method_generator(|names| format!("{}Sum", names.type_name));
    let options = options(&root)
        .with_names(names)
        .with_module_name("Calculator")
        .with_module_version(semver::Version::new(2, 0, 0))
        .with_module_description("Adds numbers");

    let catalog = initialized("param a: i64 = 1; param b: i64 = 2; return a + b;", options).await;

    let module = catalog.single().unwrap();
    assert_eq!(module.module_type.full_name(), "calc::Adder");
    assert_eq!(module.module_type.descriptor().methods[0].name, "AdderSum");
    assert_eq!(module.name, "Calculator");
    assert_eq!(module.description, "Adds numbers");
    assert!(catalog.get("Calculator", &semver::Version::new(2, 0, 0)).is_some());
    assert!(catalog.get("Calculator", &semver::Version::new(1, 0, 0)).is_none());
}

#[tokio::test]
async fn test_tags_apply_to_every_type() {
    let root = tempfile::tempdir().unwrap();
    let code = r#"
        pub struct First;
        pub struct Second;
        struct Hidden;
    "#;
    let catalog = initialized(code, options(&root).with_tag("generated").with_tag("demo")).await;

    let modules = catalog.modules();
    assert_eq!(modules.len(), 2);
    for module in &modules {
        assert_eq!(module.tags, vec!["generated".to_string(), "demo".to_string()]);
    }
    assert_eq!(catalog.by_tag("demo").len(), 2);
}

#[tokio::test]
async fn test_declarations_implementing_referenced_trait() {
    let root = tempfile::tempdir().unwrap();
    let contracts = Arc::new(Binary::from_image(
        BinaryImage::builder("Contracts")
            .with_type(TypeDescriptor::new("contracts", "Plugin").interface())
            .build(),
        None,
        None,
    ));
    let code = r#"
        use contracts::Plugin;

        pub struct Greeter {
            pub greeting: String,
        }

        impl Plugin for Greeter {
            fn run(&self) -> String {
                format!("{} world", self.greeting)
            }
        }

        pub struct Unrelated;
    "#;

    let options = options(&root).with_reference(contracts);
    let host = Arc::clone(&options.load_context.host);
    let mut catalog = GeneratedCatalog::new(code, options.clone()).unwrap();
    catalog.initialize().await.unwrap();
    assert_eq!(catalog.modules().len(), 2);
    assert!(host.loaded("Contracts").is_none());

    let greeter = catalog
        .modules()
        .into_iter()
        .find(|module| module.module_type.name() == "Greeter")
        .unwrap();
    let descriptor = greeter.module_type.descriptor();
    assert_eq!(descriptor.interfaces, vec![TypeRef::new("Contracts", "contracts::Plugin")]);
    assert_eq!(descriptor.properties[0].name, "greeting");
    assert_eq!(descriptor.methods[0].name, "run");
}

#[tokio::test]
async fn test_unknown_trait_is_invalid_source() {
    let root = tempfile::tempdir().unwrap();
    let code = "pub struct Greeter; impl Missing for Greeter {}";

    match initialize_error(code, options(&root)).await {
        ModuleError::InvalidSource { message, source_text } => {
            assert_eq!(source_text, code);
            assert!(message.contains("Missing"), "{}", message);
        }
        other => panic!("expected an invalid source error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_code_fails_fast() {
    assert!(matches!(
        GeneratedCatalog::new("", GeneratedCatalogOptions::default()),
        Err(ModuleError::InvalidArgument(_))
    ));
}

/// Compiler that fails with an unrelated error.
struct BrokenCompiler;

#[async_trait]
impl Compiler for BrokenCompiler {
    async fn generate_binary(&self, _source: &str, _references: &[Arc<Binary>]) -> Result<Arc<Binary>> {
        Err(ModuleError::Serialization("backend unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_compiler_failures_carry_the_original_code() {
    let root = tempfile::tempdir().unwrap();
    let code = "return 1;";
    let options = options(&root).with_compiler(Arc::new(BrokenCompiler));

    match initialize_error(code, options).await {
        ModuleError::InvalidSource { message, source_text } => {
            assert_eq!(source_text, code);
            assert!(message.contains("backend unavailable"));
        }
        other => panic!("expected an invalid source error, got {:?}", other),
    }
}
