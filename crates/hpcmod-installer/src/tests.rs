use super::*;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use hpcmod_core::traits::{
    Confirm, InstallOptions, ModuleManager, RecipeRegistry, UninstallRequest, ViewManager,
};
use hpcmod_core::{
    lifecycle_error, ContainerTech, LifecycleError, ModuleSystem, RecipeConfig, SoftwareName,
};

use crate::container::{build_inspect_command, build_pull_command};
use crate::receipts::parse_receipt;

const SAMTOOLS: &str = "quay.io/biocontainers/samtools";

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "hpcmod-installer-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ))
}

fn test_layout(root: &Path, module_sys: ModuleSystem, tech: ContainerTech) -> ModuleLayout {
    ModuleLayout::new(
        root.join("modules"),
        root.join("containers"),
        root.join("views"),
        module_sys,
        tech,
    )
}

fn samtools_recipe() -> RecipeConfig {
    RecipeConfig::from_yaml_str(
        r#"
docker: quay.io/biocontainers/samtools
description: Tools for manipulating next-generation sequencing data
latest:
  "1.21": sha256:bbbb
tags:
  "1.20": sha256:aaaa
  "1.21": sha256:bbbb
aliases:
  samtools: /usr/local/bin/samtools
"#,
    )
    .expect("recipe must parse")
}

#[derive(Default)]
struct MapRegistry {
    recipes: BTreeMap<String, RecipeConfig>,
}

impl MapRegistry {
    fn with(name: &str, recipe: RecipeConfig) -> Self {
        let mut registry = Self::default();
        registry.recipes.insert(name.to_string(), recipe);
        registry
    }
}

impl RecipeRegistry for MapRegistry {
    fn load_config(&self, name: &str) -> Result<RecipeConfig> {
        self.recipes
            .get(name)
            .cloned()
            .ok_or_else(|| LifecycleError::not_found(name).into())
    }
}

#[derive(Clone, Default)]
struct FakePuller {
    pulls: Rc<RefCell<Vec<String>>>,
    removed: Rc<RefCell<Vec<String>>>,
    /// Images held by the runtime store.
    store: Rc<RefCell<BTreeSet<String>>>,
}

impl ContainerPuller for FakePuller {
    fn pull(&self, tech: ContainerTech, source: &str, destination: &Path) -> Result<()> {
        self.pulls.borrow_mut().push(source.to_string());
        if tech.stores_image_file() {
            fs::write(destination, format!("image {source}"))?;
        } else {
            self.store
                .borrow_mut()
                .insert(crate::container::strip_scheme(source).to_string());
        }
        Ok(())
    }

    fn remove_image(&self, _tech: ContainerTech, image: &str) -> Result<()> {
        self.removed.borrow_mut().push(image.to_string());
        self.store.borrow_mut().remove(image);
        Ok(())
    }

    fn has_image(&self, tech: ContainerTech, image: &str) -> Result<bool> {
        Ok(!tech.stores_image_file() && self.store.borrow().contains(image))
    }
}

#[derive(Clone)]
struct ScriptedConfirm {
    answer: bool,
    asked: Rc<Cell<usize>>,
}

impl ScriptedConfirm {
    fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: Rc::new(Cell::new(0)),
        }
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, _message: &str) -> Result<bool> {
        self.asked.set(self.asked.get() + 1);
        Ok(self.answer)
    }
}

struct Fixture {
    root: PathBuf,
    layout: ModuleLayout,
    puller: FakePuller,
    confirm: ScriptedConfirm,
}

impl Fixture {
    fn new(tech: ContainerTech) -> Self {
        let root = test_root();
        let layout = test_layout(&root, ModuleSystem::Lmod, tech);
        layout.ensure_base_dirs().expect("must create base dirs");
        Self {
            root,
            layout,
            puller: FakePuller::default(),
            confirm: ScriptedConfirm::answering(true),
        }
    }

    fn manager(&self) -> FsModuleManager<MapRegistry> {
        FsModuleManager::new(
            self.layout.clone(),
            MapRegistry::with(SAMTOOLS, samtools_recipe()),
            Box::new(self.puller.clone()),
            Box::new(self.confirm.clone()),
        )
    }

    fn views(&self) -> FsViewManager {
        FsViewManager::new(self.layout.clone())
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn name(raw: &str) -> SoftwareName {
    SoftwareName::parse(raw).expect("name must parse")
}

fn forced(keep_container: bool) -> UninstallRequest {
    UninstallRequest {
        force: true,
        keep_container,
    }
}

#[test]
fn layout_paths_follow_name_and_tag() {
    let layout = test_layout(
        Path::new("/opt/hpc"),
        ModuleSystem::Tcl,
        ContainerTech::Singularity,
    );
    assert_eq!(
        layout.module_dir(SAMTOOLS, "1.21"),
        PathBuf::from("/opt/hpc/modules/quay.io/biocontainers/samtools/1.21")
    );
    assert_eq!(
        layout.module_file_path(SAMTOOLS, "1.21"),
        PathBuf::from("/opt/hpc/modules/quay.io/biocontainers/samtools/1.21/module.tcl")
    );
    assert_eq!(
        layout.container_image_path(SAMTOOLS, "1.21"),
        PathBuf::from("/opt/hpc/containers/quay.io/biocontainers/samtools/1.21/samtools-1.21.sif")
    );
    assert_eq!(
        layout.view_link_path("mpi", SAMTOOLS, "1.21"),
        PathBuf::from("/opt/hpc/views/mpi/quay.io/biocontainers/samtools/1.21")
    );
}

#[test]
fn module_identity_recovers_name_and_tag() {
    let layout = test_layout(
        Path::new("/opt/hpc"),
        ModuleSystem::Lmod,
        ContainerTech::Singularity,
    );
    let dir = layout.module_dir(SAMTOOLS, "1.21");
    assert_eq!(
        layout.module_identity(&dir),
        Some((SAMTOOLS.to_string(), "1.21".to_string()))
    );
    assert_eq!(layout.module_identity(Path::new("/elsewhere/tool/1.0")), None);
    assert_eq!(layout.module_identity(Path::new("/opt/hpc/modules/1.0")), None);
}

#[test]
fn parse_receipt_with_defaults() {
    let raw = "name=org/tool\ntag=1.0\ncontainer=/c/tool-1.0.sif\ninstalled_at_unix_nanos=42\n";
    let receipt = parse_receipt(raw).expect("must parse");
    assert_eq!(receipt.name, "org/tool");
    assert_eq!(receipt.module_sys, ModuleSystem::Lmod);
    assert_eq!(receipt.container_tech, ContainerTech::Singularity);
    assert!(receipt.container_managed);
    assert!(receipt.container_sha256.is_none());
    assert!(receipt.wrappers.is_empty());
}

#[test]
fn parse_receipt_rejects_missing_tag() {
    let err = parse_receipt("name=org/tool\ncontainer=x\ninstalled_at_unix_nanos=1\n")
        .expect_err("missing tag must fail");
    assert!(err.to_string().contains("missing tag"));
}

#[test]
fn receipts_sort_by_install_time_within_a_name() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    for (tag, nanos) in [("2.0", 10), ("1.0", 20)] {
        fs::create_dir_all(fixture.layout.module_dir("org/tool", tag)).expect("must create");
        write_module_receipt(
            &fixture.layout,
            &ModuleReceipt {
                name: "org/tool".to_string(),
                tag: tag.to_string(),
                module_sys: ModuleSystem::Lmod,
                container_tech: ContainerTech::Singularity,
                container: format!("/c/tool-{tag}.sif"),
                container_sha256: None,
                container_managed: true,
                wrappers: vec!["tool".to_string()],
                installed_at_unix_nanos: nanos,
            },
        )
        .expect("must write receipt");
    }

    let index = read_installed_index(&fixture.layout).expect("must read index");
    assert_eq!(index.tags("org/tool"), ["2.0".to_string(), "1.0".to_string()]);

    let receipt = read_module_receipt(&fixture.layout, "org/tool", "1.0")
        .expect("must read")
        .expect("receipt must exist");
    assert_eq!(receipt.wrappers, vec!["tool"]);
}

#[test]
fn lmod_module_file_prepends_wrapper_bin() {
    let recipe = samtools_recipe();
    let rendered = render_module_file(
        ModuleSystem::Lmod,
        &ModuleFileContext {
            name: SAMTOOLS,
            tag: "1.21",
            recipe: &recipe,
            container_tech: ContainerTech::Singularity,
            container: "/c/samtools-1.21.sif",
            wrapper_bin: Some(Path::new("/m/samtools/1.21/bin")),
        },
    );
    assert!(rendered.contains("whatis(\"Version: 1.21\")"));
    assert!(rendered.contains("setenv(\"SAMTOOLS_CONTAINER\", \"/c/samtools-1.21.sif\")"));
    assert!(rendered.contains("prepend_path(\"PATH\", \"/m/samtools/1.21/bin\")"));
    assert!(!rendered.contains("set_shell_function"));
}

#[test]
fn tcl_module_file_renders_aliases_without_wrappers() {
    let recipe = samtools_recipe();
    let rendered = render_module_file(
        ModuleSystem::Tcl,
        &ModuleFileContext {
            name: SAMTOOLS,
            tag: "1.21",
            recipe: &recipe,
            container_tech: ContainerTech::Singularity,
            container: "/c/samtools-1.21.sif",
            wrapper_bin: None,
        },
    );
    assert!(rendered.starts_with("#%Module\n"));
    assert!(rendered.contains("module-whatis \"Name: quay.io/biocontainers/samtools\""));
    assert!(rendered.contains(
        "set-alias samtools \"singularity exec \\${SINGULARITY_OPTS} \\${SINGULARITY_COMMAND_OPTS} /c/samtools-1.21.sif /usr/local/bin/samtools \\$*\""
    ));
}

#[test]
fn podman_wrapper_runs_entrypoint() {
    let script = render_wrapper_script(
        ContainerTech::Podman,
        "quay.io/biocontainers/samtools:1.21",
        "samtools",
    );
    assert!(script.starts_with("#!/bin/bash\n"));
    assert!(script.contains(
        "podman run -i --rm ${PODMAN_OPTS} -v \"$PWD\":\"$PWD\" -w \"$PWD\" --entrypoint samtools quay.io/biocontainers/samtools:1.21 \"$@\""
    ));
}

#[test]
fn container_env_var_uses_short_name() {
    assert_eq!(container_env_var(SAMTOOLS), "SAMTOOLS_CONTAINER");
    assert_eq!(container_env_var("org/bwa-mem2"), "BWA_MEM2_CONTAINER");
    assert_eq!(container_env_var("org/3dslicer"), "_3DSLICER_CONTAINER");
}

fn command_args(command: &Command) -> Vec<String> {
    command
        .get_args()
        .map(|arg| arg.to_string_lossy().to_string())
        .collect()
}

#[test]
fn pull_commands_match_runtime() {
    let singularity = build_pull_command(
        ContainerTech::Singularity,
        "docker://quay.io/org/tool:1.0",
        Path::new("/c/tool-1.0.sif"),
    );
    assert_eq!(singularity.get_program(), "singularity");
    assert_eq!(
        command_args(&singularity),
        vec!["pull", "--force", "/c/tool-1.0.sif", "docker://quay.io/org/tool:1.0"]
    );

    let docker = build_pull_command(
        ContainerTech::Docker,
        "docker://quay.io/org/tool:1.0",
        Path::new("/unused"),
    );
    assert_eq!(docker.get_program(), "docker");
    assert_eq!(command_args(&docker), vec!["pull", "quay.io/org/tool:1.0"]);
    assert_eq!(strip_scheme("oras://ghcr.io/org/tool:1"), "ghcr.io/org/tool:1");
}

#[test]
fn install_bare_name_installs_latest_tag() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let manager = fixture.manager();

    let module_dir = manager
        .install(&name(SAMTOOLS), &InstallOptions::default())
        .expect("install must succeed");
    assert_eq!(module_dir, fixture.layout.module_dir(SAMTOOLS, "1.21"));
    assert!(fixture.layout.module_file_path(SAMTOOLS, "1.21").is_file());
    assert_eq!(
        fixture.puller.pulls.borrow().as_slice(),
        ["docker://quay.io/biocontainers/samtools:1.21".to_string()]
    );

    let image = fixture.layout.container_image_path(SAMTOOLS, "1.21");
    let receipt = manager
        .receipt(SAMTOOLS, "1.21")
        .expect("must read receipt")
        .expect("receipt must exist");
    assert_eq!(receipt.container, image.display().to_string());
    assert_eq!(
        receipt.container_sha256.as_deref(),
        Some(sha256_file(&image).expect("must hash").as_str())
    );
    assert_eq!(receipt.wrappers, vec!["samtools"]);

    let wrapper = fixture
        .layout
        .wrapper_bin_dir(SAMTOOLS, "1.21")
        .join("samtools");
    let script = fs::read_to_string(&wrapper).expect("wrapper must exist");
    assert!(script.contains("singularity exec"));
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&wrapper)
            .expect("must stat wrapper")
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}

#[test]
fn install_without_wrapper_scripts_uses_shell_functions() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let manager = fixture.manager().with_wrapper_scripts(false);
    manager
        .install(&name("quay.io/biocontainers/samtools:1.20"), &InstallOptions::default())
        .expect("install must succeed");

    assert!(!fixture.layout.wrapper_bin_dir(SAMTOOLS, "1.20").exists());
    let module_file = fs::read_to_string(fixture.layout.module_file_path(SAMTOOLS, "1.20"))
        .expect("module file must exist");
    assert!(module_file.contains("set_shell_function(\"samtools\""));
}

#[test]
fn install_rejects_unknown_tag() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let err = fixture
        .manager()
        .install(&name("quay.io/biocontainers/samtools:9.9"), &InstallOptions::default())
        .expect_err("unknown tag must fail");
    assert!(matches!(
        lifecycle_error(&err),
        Some(LifecycleError::InvalidArgument(_))
    ));
    assert!(!fixture.layout.software_dir(SAMTOOLS).exists());
}

#[test]
fn install_without_latest_fails() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let mut recipe = samtools_recipe();
    recipe.latest.clear();
    let manager = FsModuleManager::new(
        fixture.layout.clone(),
        MapRegistry::with(SAMTOOLS, recipe),
        Box::new(fixture.puller.clone()),
        Box::new(fixture.confirm.clone()),
    );

    let err = manager
        .install(&name(SAMTOOLS), &InstallOptions::default())
        .expect_err("missing latest must fail");
    assert_eq!(
        lifecycle_error(&err),
        Some(&LifecycleError::NoLatestVersion {
            name: SAMTOOLS.to_string()
        })
    );
}

#[test]
fn install_unknown_recipe_is_not_found() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let err = fixture
        .manager()
        .install(&name("org/missing"), &InstallOptions::default())
        .expect_err("unknown recipe must fail");
    assert!(matches!(
        lifecycle_error(&err),
        Some(LifecycleError::NotFound { .. })
    ));
}

#[test]
fn install_twice_without_force_is_a_no_op() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let manager = fixture.manager();
    manager
        .install(&name(SAMTOOLS), &InstallOptions::default())
        .expect("first install must succeed");
    let before = manager
        .receipt(SAMTOOLS, "1.21")
        .expect("must read")
        .expect("receipt must exist");

    manager
        .install(&name(SAMTOOLS), &InstallOptions::default())
        .expect("second install must succeed");
    let after = manager
        .receipt(SAMTOOLS, "1.21")
        .expect("must read")
        .expect("receipt must exist");

    assert_eq!(before, after);
    assert_eq!(fixture.puller.pulls.borrow().len(), 1);
    assert_eq!(
        manager.list(None).expect("must list").tags(SAMTOOLS),
        ["1.21".to_string()]
    );
}

#[test]
fn reinstall_with_kept_container_reuses_artifact_untouched() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let manager = fixture.manager();
    let target = name("quay.io/biocontainers/samtools:1.21");
    manager
        .install(&target, &InstallOptions::default())
        .expect("install must succeed");

    let image = fixture.layout.container_image_path(SAMTOOLS, "1.21");
    let modified_before = fs::metadata(&image)
        .expect("image must exist")
        .modified()
        .expect("mtime");

    assert!(manager
        .uninstall(&target, forced(true))
        .expect("uninstall must succeed"));
    assert!(!fixture.layout.module_dir(SAMTOOLS, "1.21").exists());
    assert!(image.is_file());

    std::thread::sleep(std::time::Duration::from_millis(20));
    manager
        .install(&target, &InstallOptions::default())
        .expect("reinstall must succeed");

    let modified_after = fs::metadata(&image)
        .expect("image must exist")
        .modified()
        .expect("mtime");
    assert_eq!(modified_before, modified_after);
    assert_eq!(fixture.puller.pulls.borrow().len(), 1);
}

#[test]
fn uninstall_removes_container_and_prunes_dirs() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let manager = fixture.manager();
    manager
        .install(&name(SAMTOOLS), &InstallOptions::default())
        .expect("install must succeed");

    assert!(manager
        .uninstall(&name(SAMTOOLS), forced(false))
        .expect("uninstall must succeed"));
    assert!(!fixture.layout.container_image_path(SAMTOOLS, "1.21").exists());
    assert!(!fixture.root.join("containers/quay.io").exists());
    assert!(!fixture.root.join("modules/quay.io").exists());
    assert!(fixture.layout.module_base().is_dir());
    assert!(manager.list(None).expect("must list").is_empty());
}

#[test]
fn uninstall_bare_name_removes_every_tag_and_view_entry() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let manager = fixture.manager();
    let views = fixture.views();
    views.create("mpi").expect("must create view");
    for tag in ["1.20", "1.21"] {
        let target = name(SAMTOOLS).with_tag(tag);
        let dir = manager
            .install(&target, &InstallOptions::default())
            .expect("install must succeed");
        views
            .install_module("mpi", &target, &dir)
            .expect("must add to view");
    }
    assert_eq!(views.members("mpi").expect("members").len(), 2);

    assert!(manager
        .uninstall(&name(SAMTOOLS), forced(false))
        .expect("uninstall must succeed"));
    assert!(manager.list(None).expect("must list").is_empty());
    assert!(views.members("mpi").expect("members").is_empty());
    assert!(!fixture.layout.view_dir("mpi").join("quay.io").exists());
    assert!(views.exists("mpi"));
}

#[test]
fn declined_uninstall_leaves_module_in_place() {
    let mut fixture = Fixture::new(ContainerTech::Singularity);
    fixture.confirm = ScriptedConfirm::answering(false);
    let manager = fixture.manager();
    manager
        .install(&name(SAMTOOLS), &InstallOptions::default())
        .expect("install must succeed");

    let removed = manager
        .uninstall(
            &name(SAMTOOLS),
            UninstallRequest {
                force: false,
                keep_container: false,
            },
        )
        .expect("uninstall must not fail");
    assert!(!removed);
    assert_eq!(fixture.confirm.asked.get(), 1);
    assert!(fixture.layout.module_file_path(SAMTOOLS, "1.21").is_file());
}

#[test]
fn uninstall_of_missing_module_reports_nothing_removed() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let manager = fixture.manager();
    assert!(!manager
        .uninstall(&name("org/absent"), forced(false))
        .expect("must not fail"));
    assert!(!manager
        .uninstall(&name("org/absent:1.0"), forced(false))
        .expect("must not fail"));
    assert_eq!(fixture.confirm.asked.get(), 0);
}

#[test]
fn keep_path_image_is_referenced_and_survives_uninstall() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let local = fixture.root.join("local.sif");
    fs::write(&local, b"local image").expect("must write image");
    let manager = fixture.manager();

    let options = InstallOptions {
        container_image: Some(local.clone()),
        keep_path: true,
        force: false,
    };
    manager
        .install(&name("quay.io/biocontainers/samtools:dev"), &options)
        .expect("install must succeed");
    let receipt = manager
        .receipt(SAMTOOLS, "dev")
        .expect("must read")
        .expect("receipt must exist");
    assert!(!receipt.container_managed);
    assert!(fixture.puller.pulls.borrow().is_empty());

    manager
        .uninstall(&name("quay.io/biocontainers/samtools:dev"), forced(false))
        .expect("uninstall must succeed");
    assert!(local.is_file());
}

#[test]
fn copied_image_is_managed() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let local = fixture.root.join("local.sif");
    fs::write(&local, b"local image").expect("must write image");
    let manager = fixture.manager();

    let options = InstallOptions {
        container_image: Some(local.clone()),
        ..InstallOptions::default()
    };
    manager
        .install(&name("quay.io/biocontainers/samtools:1.20"), &options)
        .expect("install must succeed");
    let copy = fixture.layout.container_image_path(SAMTOOLS, "1.20");
    assert_eq!(fs::read(&copy).expect("copy must exist"), b"local image");

    manager
        .uninstall(&name("quay.io/biocontainers/samtools:1.20"), forced(false))
        .expect("uninstall must succeed");
    assert!(!copy.exists());
    assert!(local.is_file());
}

#[test]
fn podman_install_keeps_image_in_runtime_store() {
    let fixture = Fixture::new(ContainerTech::Podman);
    let manager = fixture.manager();
    manager
        .install(&name(SAMTOOLS), &InstallOptions::default())
        .expect("install must succeed");
    let receipt = manager
        .receipt(SAMTOOLS, "1.21")
        .expect("must read")
        .expect("receipt must exist");
    assert_eq!(receipt.container, "quay.io/biocontainers/samtools:1.21");
    assert!(receipt.container_sha256.is_none());
    assert!(!fixture.layout.container_image_path(SAMTOOLS, "1.21").exists());

    manager
        .uninstall(&name(SAMTOOLS), forced(false))
        .expect("uninstall must succeed");
    assert_eq!(
        fixture.puller.removed.borrow().as_slice(),
        ["quay.io/biocontainers/samtools:1.21".to_string()]
    );
}

#[test]
fn list_filters_by_substring() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let manager = fixture.manager();
    manager
        .install(&name(SAMTOOLS), &InstallOptions::default())
        .expect("install must succeed");

    assert_eq!(manager.list(Some("samtools")).expect("must list").len(), 1);
    assert!(manager.list(Some("bwa")).expect("must list").is_empty());
}

#[test]
fn view_lifecycle_tracks_membership() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let manager = fixture.manager();
    let views = fixture.views();
    let target = name(SAMTOOLS).with_tag("1.21");
    let dir = manager
        .install(&target, &InstallOptions::default())
        .expect("install must succeed");

    views.create("mpi").expect("must create view");
    views.create("base").expect("must create view");
    assert!(views.create("mpi").is_err());
    assert_eq!(views.view_names().expect("must list"), vec!["base", "mpi"]);

    assert!(!views.contains("mpi", &dir).expect("must check"));
    views
        .install_module("mpi", &target, &dir)
        .expect("must add to view");
    views
        .install_module("mpi", &target, &dir)
        .expect("second add must be a no-op");
    assert!(views.contains("mpi", &dir).expect("must check"));
    assert!(!views.contains("base", &dir).expect("must check"));
    assert_eq!(
        views.members("mpi").expect("members"),
        vec![format!("{SAMTOOLS}:1.21")]
    );

    #[cfg(unix)]
    {
        let link = fixture.layout.view_link_path("mpi", SAMTOOLS, "1.21");
        assert_eq!(
            fs::read_link(&link).expect("must be a symlink"),
            fixture.layout.module_file_path(SAMTOOLS, "1.21")
        );
    }

    assert!(views
        .uninstall_module("mpi", SAMTOOLS, "1.21")
        .expect("must remove"));
    assert!(!views
        .uninstall_module("mpi", SAMTOOLS, "1.21")
        .expect("second remove is a no-op"));
    assert!(views.members("mpi").expect("members").is_empty());

    views.delete("mpi").expect("must delete view");
    assert_eq!(views.list().expect("must list"), vec!["base"]);
}

#[test]
fn view_rejects_module_that_is_not_installed() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let views = fixture.views();
    views.create("mpi").expect("must create view");
    let target = name(SAMTOOLS).with_tag("1.21");
    let dir = fixture.layout.module_dir(SAMTOOLS, "1.21");

    let err = views
        .install_module("mpi", &target, &dir)
        .expect_err("missing module must fail");
    assert!(matches!(
        lifecycle_error(&err),
        Some(LifecycleError::NotInstalled { .. })
    ));
    assert!(views.install_module("absent", &target, &dir).is_err());
}

#[test]
fn view_names_are_validated() {
    let fixture = Fixture::new(ContainerTech::Singularity);
    let views = fixture.views();
    for bad in ["", "..", "a/b", "my view"] {
        assert!(views.create(bad).is_err(), "'{bad}' must be rejected");
    }
}

#[test]
fn podman_reinstall_with_kept_image_does_not_pull_again() {
    let fixture = Fixture::new(ContainerTech::Podman);
    let manager = fixture.manager();
    let target = name(SAMTOOLS).with_tag("1.21");
    manager
        .install(&target, &InstallOptions::default())
        .expect("install must succeed");
    manager
        .uninstall(&target, forced(true))
        .expect("uninstall must succeed");
    assert!(fixture.puller.removed.borrow().is_empty());

    manager
        .install(&target, &InstallOptions::default())
        .expect("reinstall must succeed");
    assert_eq!(fixture.puller.pulls.borrow().len(), 1);

    manager
        .uninstall(&target, forced(false))
        .expect("uninstall must succeed");
    manager
        .install(&target, &InstallOptions::default())
        .expect("install must succeed");
    assert_eq!(fixture.puller.pulls.borrow().len(), 2);
}

#[test]
fn inspect_command_queries_runtime_store() {
    let command = build_inspect_command(ContainerTech::Docker, "org/tool:1.0");
    assert_eq!(command.get_program(), "docker");
    assert_eq!(command_args(&command), vec!["image", "inspect", "org/tool:1.0"]);
}
