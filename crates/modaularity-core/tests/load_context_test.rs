//! Loading context resolution policy tests.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{contracts_image, isolated_host, json_image, load_options, plugin_image, write_binary};
use modaularity_core::{
    CriteriaBuilder, HostBinaryPolicy, HostEnvironment, LoadContext, ResolutionSource,
    RuntimeHint, TypeFinder, TypeRef,
};

fn version(major: u64) -> semver::Version {
    semver::Version::new(major, 0, 0)
}

/// `<root>/<name>/` holding the plugin, `Json` at `json_major` and
/// `Contracts`.
fn plugin_dir(root: &Path, name: &str, json_major: u64) -> std::path::PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    write_binary(&dir, &json_image(version(json_major)));
    write_binary(&dir, &contracts_image());
    write_binary(&dir, &plugin_image(name))
}

/// Host that has already loaded `Json` at `major`.
fn host_with_json(root: &Path, major: u64) -> Arc<HostEnvironment> {
    let host = isolated_host(root);
    let path = write_binary(host.base_dir(), &json_image(version(major)));
    host.load_from_path(&path).unwrap();
    host
}

#[test]
fn test_never_ignores_host_binaries() {
    let root = tempfile::tempdir().unwrap();
    let host = host_with_json(root.path(), 1);
    let plugin = plugin_dir(root.path(), "Plugin", 2);

    let context = LoadContext::new(
        &plugin,
        load_options(Arc::clone(&host)).with_policy(HostBinaryPolicy::Never),
    );
    context.load().unwrap();

    let json = context.resolve("Json").unwrap().unwrap();
    assert_eq!(json.source, ResolutionSource::Closure);
    assert_eq!(json.binary.version(), Some(&version(2)));
    assert_eq!(json.binary.context(), Some(context.id()));
    assert!(!Arc::ptr_eq(&json.binary, &host.loaded("Json").unwrap()));
}

#[test]
fn test_always_uses_host_without_touching_closure() {
    let root = tempfile::tempdir().unwrap();
    let host = host_with_json(root.path(), 1);
    let plugin = plugin_dir(root.path(), "Plugin", 2);

    // A broken closure copy would fail the request if it were read.
    std::fs::write(plugin.parent().unwrap().join("Json.modb"), "corrupt").unwrap();

    let context = LoadContext::new(&plugin, load_options(Arc::clone(&host)));
    context.load().unwrap();

    let json = context.resolve("json").unwrap().unwrap();
    assert_eq!(json.source, ResolutionSource::Host);
    assert!(Arc::ptr_eq(&json.binary, &host.loaded("Json").unwrap()));
    assert_eq!(context.loaded_binaries().len(), 1);
}

#[test]
fn test_selected_only_shares_listed_binaries() {
    let root = tempfile::tempdir().unwrap();
    let host = host_with_json(root.path(), 1);
    write_binary(host.base_dir(), &contracts_image());
    let plugin = plugin_dir(root.path(), "Plugin", 2);

    let context = LoadContext::new(
        &plugin,
        load_options(Arc::clone(&host))
            .with_policy(HostBinaryPolicy::Selected)
            .with_host_binary("CONTRACTS"),
    );
    context.load().unwrap();

    assert_eq!(context.resolve("Contracts").unwrap().unwrap().source, ResolutionSource::Host);
    let json = context.resolve("Json").unwrap().unwrap();
    assert_eq!(json.source, ResolutionSource::Closure);
    assert_eq!(json.binary.version(), Some(&version(2)));
}

#[test]
fn test_prefer_module_falls_back_to_host() {
    let root = tempfile::tempdir().unwrap();
    let host = host_with_json(root.path(), 1);
    let plugin = plugin_dir(root.path(), "Plugin", 2);
    std::fs::remove_file(plugin.parent().unwrap().join("Json.modb")).unwrap();

    let context = LoadContext::new(
        &plugin,
        load_options(Arc::clone(&host)).with_policy(HostBinaryPolicy::PreferModule),
    );
    context.load().unwrap();

    assert_eq!(context.resolve("Contracts").unwrap().unwrap().source, ResolutionSource::Closure);
    let json = context.resolve("Json").unwrap().unwrap();
    assert_eq!(json.source, ResolutionSource::Host);
    assert_eq!(json.binary.version(), Some(&version(1)));
}

#[test]
fn test_hints_win_over_closure() {
    let root = tempfile::tempdir().unwrap();
    let host = isolated_host(root.path());
    let plugin = plugin_dir(root.path(), "Plugin", 2);

    let hinted_dir = root.path().join("packages");
    std::fs::create_dir_all(&hinted_dir).unwrap();
    let hinted = write_binary(&hinted_dir, &json_image(version(3)));

    let context = LoadContext::new(
        &plugin,
        load_options(host)
            .with_policy(HostBinaryPolicy::Never)
            .with_runtime_hint(RuntimeHint::new("json.modb", root.path().join("wrong-case.modb"), false))
            .with_runtime_hint(RuntimeHint::new("Json.modb", &hinted, false)),
    );
    context.load().unwrap();

    let json = context.resolve("Json").unwrap().unwrap();
    assert_eq!(json.source, ResolutionSource::Hint);
    assert_eq!(json.binary.path(), Some(hinted.as_path()));
}

#[test]
fn test_additional_runtime_paths_are_searched_recursively() {
    let root = tempfile::tempdir().unwrap();
    let host = isolated_host(root.path());

    let module_dir = root.path().join("plugin");
    std::fs::create_dir_all(&module_dir).unwrap();
    let plugin = write_binary(&module_dir, &plugin_image("Plugin"));

    let shared = root.path().join("shared");
    std::fs::create_dir_all(shared.join("deep")).unwrap();
    write_binary(&shared.join("deep"), &json_image(version(4)));

    let context = LoadContext::new(
        &plugin,
        load_options(host)
            .with_policy(HostBinaryPolicy::Never)
            .with_additional_runtime_path(&shared),
    );
    context.load().unwrap();

    let json = context.resolve("Json").unwrap().unwrap();
    assert_eq!(json.source, ResolutionSource::RuntimePath);
    assert_eq!(json.binary.version(), Some(&version(4)));

    assert!(context.resolve("Contracts").unwrap().is_none());
}

#[test]
fn test_conflicting_versions_stay_isolated() {
    let root = tempfile::tempdir().unwrap();
    let host = isolated_host(root.path());
    let first = plugin_dir(root.path(), "First", 1);
    let second = plugin_dir(root.path(), "Second", 2);

    let options = load_options(host).with_policy(HostBinaryPolicy::Never);
    let first = LoadContext::new(&first, options.clone());
    let second = LoadContext::new(&second, options);
    first.load().unwrap();
    second.load().unwrap();

    let first_json = first.resolve("Json").unwrap().unwrap();
    let second_json = second.resolve("Json").unwrap().unwrap();
    assert_eq!(first_json.binary.version(), Some(&version(1)));
    assert_eq!(second_json.binary.version(), Some(&version(2)));
    assert_ne!(first_json.binary.context(), second_json.binary.context());

    // Cached per context.
    let again = first.resolve("JSON").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first_json.binary, &again.binary));
}

#[test]
fn test_criteria_resolve_through_the_context() {
    let root = tempfile::tempdir().unwrap();
    let host = isolated_host(root.path());
    let plugin = plugin_dir(root.path(), "Plugin", 2);

    let context = LoadContext::new(&plugin, load_options(host).with_policy(HostBinaryPolicy::Never));
    let binary = context.load().unwrap();

    let criteria = CriteriaBuilder::new()
        .implements(TypeRef::new("Contracts", "contracts::IPlugin"))
        .build();
    let found = TypeFinder::new().find(Some(&criteria), &binary, &context).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].full_name(), "plugin::Plugin");

    let missing = CriteriaBuilder::new()
        .implements(TypeRef::new("Absent", "absent::IThing"))
        .build();
    assert!(TypeFinder::new().find(Some(&missing), &binary, &context).unwrap().is_empty());
}

#[test]
fn test_unreadable_dependency_surfaces_as_error() {
    let root = tempfile::tempdir().unwrap();
    let host = isolated_host(root.path());
    let plugin = plugin_dir(root.path(), "Plugin", 2);
    std::fs::write(plugin.parent().unwrap().join("Json.modb"), "corrupt").unwrap();

    let context = LoadContext::new(&plugin, load_options(host).with_policy(HostBinaryPolicy::Never));
    context.load().unwrap();
    assert!(context.resolve("Json").is_err());
}

#[test]
fn test_corrupt_closure_copy_does_not_fall_back_to_host() {
    let root = tempfile::tempdir().unwrap();
    let host = host_with_json(root.path(), 1);
    let plugin = plugin_dir(root.path(), "Plugin", 2);
    std::fs::write(plugin.parent().unwrap().join("Json.modb"), "corrupt").unwrap();

    let context = LoadContext::new(
        &plugin,
        load_options(Arc::clone(&host)).with_policy(HostBinaryPolicy::PreferModule),
    );
    context.load().unwrap();

    assert!(context.resolve("Json").is_err());
    assert!(context.loaded_binaries().iter().all(|binary| binary.name() != "Json"));
}
