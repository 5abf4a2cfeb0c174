use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use hpcmod_core::lifecycle_error;

use super::*;

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "hpcmod-registry-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
}

fn write_recipe(root: &Path, name: &str, body: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).expect("must create recipe dir");
    fs::write(dir.join(RECIPE_FILE_NAME), body).expect("must write recipe");
}

#[test]
fn filesystem_registry_loads_recipe() {
    let root = test_root();
    write_recipe(
        &root,
        "quay.io/biocontainers/samtools",
        "docker: quay.io/biocontainers/samtools\nlatest:\n  1.21--h50ea8bc_0: sha256:aaaa\n",
    );

    let registry = FilesystemRegistry::open(&root);
    let recipe = registry
        .load("quay.io/biocontainers/samtools")
        .expect("must load")
        .expect("recipe must exist");
    assert_eq!(recipe.latest_tag(), Some("1.21--h50ea8bc_0"));
    assert!(registry.load("quay.io/biocontainers/bwa").expect("must load").is_none());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn filesystem_registry_reports_parse_failures_with_path() {
    let root = test_root();
    write_recipe(&root, "org/broken", "latest: [not, a, map]\n");

    let err = FilesystemRegistry::open(&root)
        .load("org/broken")
        .expect_err("broken recipe must fail");
    assert!(err.to_string().contains("failed parsing recipe"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn search_names_walks_nested_namespaces() {
    let root = test_root();
    write_recipe(&root, "quay.io/biocontainers/samtools", "docker: a\n");
    write_recipe(&root, "quay.io/biocontainers/bwa", "docker: b\n");
    write_recipe(&root, "ghcr.io/autamus/samtools", "docker: c\n");

    let registry = FilesystemRegistry::open(&root);
    assert_eq!(
        registry.search_names("samtools").expect("must search"),
        vec!["ghcr.io/autamus/samtools", "quay.io/biocontainers/samtools"]
    );
    assert_eq!(registry.search_names("").expect("must search").len(), 3);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn search_on_missing_root_is_empty() {
    let registry = FilesystemRegistry::open(test_root());
    assert!(registry.search_names("tool").expect("must search").is_empty());
}

#[test]
fn registries_prefer_earlier_sources() {
    let first = test_root();
    let second = test_root();
    write_recipe(&first, "org/tool", "docker: first/tool\nlatest:\n  '2.0': x\n");
    write_recipe(&second, "org/tool", "docker: second/tool\nlatest:\n  '1.0': x\n");
    write_recipe(&second, "org/only-second", "docker: second/only\n");

    let registries = Registries::from_locations(&[
        first.display().to_string(),
        second.display().to_string(),
    ])
    .expect("must build registries");

    let recipe = registries.load_config("org/tool").expect("must load");
    assert_eq!(recipe.docker.as_deref(), Some("first/tool"));
    let fallback = registries
        .load_config("org/only-second")
        .expect("must fall back to second source");
    assert_eq!(fallback.docker.as_deref(), Some("second/only"));

    let _ = fs::remove_dir_all(&first);
    let _ = fs::remove_dir_all(&second);
}

#[test]
fn registries_strip_tag_before_lookup() {
    let root = test_root();
    write_recipe(&root, "org/tool", "docker: org/tool\n");
    let registries =
        Registries::from_locations(&[root.display().to_string()]).expect("must build");

    assert!(registries.load_config("org/tool:1.0").is_ok());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unknown_recipe_is_not_found() {
    let registries =
        Registries::from_locations(&[test_root().display().to_string()]).expect("must build");
    let err = registries
        .load_config("org/missing")
        .expect_err("unknown recipe must fail");
    assert_eq!(
        lifecycle_error(&err),
        Some(&LifecycleError::not_found("org/missing"))
    );
}

#[test]
fn http_locations_become_remote_sources() {
    let source = RegistrySource::from_location("https://example.test/registry/")
        .expect("must build remote source");
    let RegistrySource::Remote(remote) = source else {
        panic!("expected remote source");
    };
    assert_eq!(
        remote.recipe_url("org/tool"),
        "https://example.test/registry/org/tool/container.yaml"
    );
}
