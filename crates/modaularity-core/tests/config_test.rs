//! Catalogs built from declarative configuration files.

mod common;

use common::{isolated_host, json_image, load_options, operators_image, write_binary};
use modaularity_core::prelude::*;
use modaularity_core::{CatalogConfigLoader, ConverterRegistry};

#[tokio::test]
async fn test_toml_file_builds_composite_in_order() {
    let root = tempfile::tempdir().unwrap();
    let plugins = root.path().join("plugins");
    std::fs::create_dir_all(&plugins).unwrap();
    write_binary(&plugins, &operators_image());

    let extra = root.path().join("extra");
    std::fs::create_dir_all(&extra).unwrap();
    let json = write_binary(&extra, &json_image(semver::Version::new(3, 1, 0)));

    let config_path = root.path().join("catalogs.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[modaularity]
name = "demo"

[[modaularity.catalogs]]
type = "Folder"
path = '{}'
options = {{ include_subfolders = false }}

[[modaularity.catalogs]]
type = "Assembly"
path = '{}'
"#,
            plugins.display(),
            json.display()
        ),
    )
    .unwrap();

    let configurations = CatalogConfigLoader::from_file(&config_path).unwrap();
    assert_eq!(configurations.len(), 2);

    let defaults = CatalogDefaults::new().with_load_context(load_options(isolated_host(root.path())));
    let mut catalog = ConverterRegistry::new()
        .build_composite(&configurations, &defaults)
        .unwrap();
    assert_eq!(catalog.len(), 2);

    catalog.initialize().await.unwrap();
    let modules = catalog.modules();
    assert_eq!(modules.len(), 7);
    assert_eq!(modules.last().unwrap().name, "json::Serializer");
    assert!(catalog
        .get("json::Serializer", &semver::Version::new(3, 1, 0))
        .is_some());
}

#[tokio::test]
async fn test_defaults_flow_into_configured_catalogs() {
    let root = tempfile::tempdir().unwrap();
    let path = write_binary(root.path(), &operators_image());

    let configurations = CatalogConfigLoader::from_json(&serde_json::json!({
        "catalogs": [ { "Type": "Binary", "Path": path } ]
    })
    .to_string())
    .unwrap();

    let defaults = CatalogDefaults::new()
        .with_load_context(load_options(isolated_host(root.path())))
        .with_criteria(FinderOptions::new().configure(|builder| builder.has_name("*Sum*").tag("sum")))
        .with_naming(NamingOptions::new().with_fixed_version(semver::Version::new(7, 0, 0)));

    let mut catalog = ConverterRegistry::new()
        .build_composite(&configurations, &defaults)
        .unwrap();
    catalog.initialize().await.unwrap();

    let module = catalog.single().unwrap();
    assert_eq!(module.name, "ops::SumOperator");
    assert_eq!(module.version, semver::Version::new(7, 0, 0));
    assert_eq!(module.tags, vec!["sum"]);
}

#[tokio::test]
async fn test_first_failing_child_aborts() {
    let root = tempfile::tempdir().unwrap();
    let configurations = vec![
        modaularity_core::CatalogConfiguration::new("Binary", root.path().join("Missing.modb").display().to_string()),
    ];
    let defaults = CatalogDefaults::new().with_load_context(load_options(isolated_host(root.path())));

    let mut catalog = ConverterRegistry::new()
        .build_composite(&configurations, &defaults)
        .unwrap();
    catalog.add_catalog(UnreachableCatalog::default());

    assert!(matches!(
        catalog.initialize().await,
        Err(ModuleError::BinaryNotFound(_))
    ));
    assert!(!catalog.is_initialized());
}

/// Must never be initialized.
#[derive(Default)]
struct UnreachableCatalog {
    initialized: bool,
}

#[async_trait::async_trait]
impl ModuleCatalog for UnreachableCatalog {
    async fn initialize(&mut self) -> Result<()> {
        panic!("children after a failure must not be initialized");
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn modules(&self) -> Vec<std::sync::Arc<Module>> {
        Vec::new()
    }

    fn get(&self, _name: &str, _version: &semver::Version) -> Option<std::sync::Arc<Module>> {
        None
    }
}
