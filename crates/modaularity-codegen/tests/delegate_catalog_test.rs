//! Delegate catalog tests: parameter routing onto the synthesized type.

use std::sync::Arc;

use serde_json::Value;

use modaularity_codegen::{Callable, ConversionRule, DelegateCatalog, DelegateCatalogOptions, WrapperNames};
use modaularity_core::prelude::*;
use modaularity_core::ParameterSignature;

fn options(root: &tempfile::TempDir) -> DelegateCatalogOptions {
    let host = Arc::new(HostEnvironment::new(root.path()));
    DelegateCatalogOptions::default().with_load_context(LoadContextOptions::new(host))
}

fn greet() -> Callable {
    Callable::new(|args| {
        let name = args[0].as_str().unwrap_or_default();
        let times = args[1].as_u64().unwrap_or(1) as usize;
        Ok(Value::from(format!("Hello {}", name).repeat(times)))
    })
    .with_parameter("name", "String")
    .with_parameter("times", "u32")
    .returning("String")
}

#[tokio::test]
async fn test_callable_becomes_single_method() {
    let root = tempfile::tempdir().unwrap();
    let mut catalog = DelegateCatalog::new(Some(greet()), options(&root)).unwrap();
    catalog.initialize().await.unwrap();

    let module = catalog.single().unwrap();
    assert_eq!(module.name, "GeneratedNamespace::GeneratedType");

    let descriptor = module.module_type.descriptor();
    assert!(descriptor.constructor.is_empty());
    assert!(descriptor.properties.is_empty());
    assert_eq!(descriptor.methods.len(), 1);
    assert_eq!(descriptor.methods[0].name, "Run");
    assert_eq!(
        descriptor.methods[0].parameters,
        vec![ParameterSignature::new("name", "String"), ParameterSignature::new("times", "u32")]
    );
    assert_eq!(descriptor.methods[0].return_type.as_deref(), Some("String"));

    let result = catalog.callable().call(&[Value::from("bob"), Value::from(2)]).unwrap();
    assert_eq!(result, Value::from("Hello bobHello bob"));
}

#[tokio::test]
async fn test_conversion_rules_route_parameters() {
    let root = tempfile::tempdir().unwrap();
    let options = options(&root)
        .with_conversion_rule(ConversionRule::to_constructor(|p| p.position == 0))
        .with_conversion_rule(ConversionRule::to_property(|p| p.type_name == "u32"))
        .with_names(WrapperNames::new().with_type_name("Greeter").with_method("Greet"))
        .with_module_name("GreeterModule")
        .with_tag("delegates");

    let mut catalog = DelegateCatalog::new(Some(greet()), options).unwrap();
    catalog.initialize().await.unwrap();

    let module = catalog.single().unwrap();
    assert_eq!(module.name, "GreeterModule");
    assert_eq!(module.tag(), Some("delegates"));

    let descriptor = module.module_type.descriptor();
    assert_eq!(descriptor.name, "Greeter");
    assert_eq!(descriptor.constructor, vec![ParameterSignature::new("name", "String")]);
    assert_eq!(descriptor.properties.len(), 1);
    assert_eq!(descriptor.properties[0].name, "times");
    assert_eq!(descriptor.methods[0].name, "Greet");
    assert!(descriptor.methods[0].parameters.is_empty());
}

#[tokio::test]
async fn test_async_callable_yields_async_method() {
    let root = tempfile::tempdir().unwrap();
    let callable = Callable::new(|_| Ok(Value::Null)).asynchronous();
    let mut catalog = DelegateCatalog::new(Some(callable), options(&root)).unwrap();
    catalog.initialize().await.unwrap();

    let module = catalog.single().unwrap();
    let method = &module.module_type.descriptor().methods[0];
    assert!(method.is_async);
    assert_eq!(method.return_type, None);
}

#[test]
fn test_missing_callable_fails_fast() {
    assert!(matches!(
        DelegateCatalog::new(None, DelegateCatalogOptions::default()),
        Err(ModuleError::InvalidArgument(_))
    ));
}
