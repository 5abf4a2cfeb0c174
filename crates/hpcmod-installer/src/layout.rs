use anyhow::{Context, Result};
use hpcmod_core::{ContainerTech, ModuleSystem, Settings};
use std::fs;
use std::path::{Path, PathBuf};

pub const RECEIPT_FILE_NAME: &str = "install.receipt";
pub const VIEW_CONFIG_FILE_NAME: &str = "view.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    module_base: PathBuf,
    container_base: PathBuf,
    views_base: PathBuf,
    module_sys: ModuleSystem,
    container_tech: ContainerTech,
}

impl ModuleLayout {
    pub fn new(
        module_base: impl Into<PathBuf>,
        container_base: impl Into<PathBuf>,
        views_base: impl Into<PathBuf>,
        module_sys: ModuleSystem,
        container_tech: ContainerTech,
    ) -> Self {
        Self {
            module_base: module_base.into(),
            container_base: container_base.into(),
            views_base: views_base.into(),
            module_sys,
            container_tech,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.module_base,
            &settings.container_base,
            &settings.views_base,
            settings.module_sys,
            settings.container_tech,
        )
    }

    pub fn module_base(&self) -> &Path {
        &self.module_base
    }

    pub fn container_base(&self) -> &Path {
        &self.container_base
    }

    pub fn views_base(&self) -> &Path {
        &self.views_base
    }

    pub fn module_sys(&self) -> ModuleSystem {
        self.module_sys
    }

    pub fn container_tech(&self) -> ContainerTech {
        self.container_tech
    }

    pub fn software_dir(&self, name: &str) -> PathBuf {
        self.module_base.join(name)
    }

    pub fn module_dir(&self, name: &str, tag: &str) -> PathBuf {
        self.software_dir(name).join(tag)
    }

    pub fn module_file_path(&self, name: &str, tag: &str) -> PathBuf {
        self.module_dir(name, tag)
            .join(self.module_sys.module_file_name())
    }

    pub fn wrapper_bin_dir(&self, name: &str, tag: &str) -> PathBuf {
        self.module_dir(name, tag).join("bin")
    }

    pub fn receipt_path(&self, name: &str, tag: &str) -> PathBuf {
        self.module_dir(name, tag).join(RECEIPT_FILE_NAME)
    }

    pub fn container_dir(&self, name: &str, tag: &str) -> PathBuf {
        self.container_base.join(name).join(tag)
    }

    /// Where a pulled `.sif` for `name:tag` lives.
    pub fn container_image_path(&self, name: &str, tag: &str) -> PathBuf {
        let short = name.rsplit('/').next().unwrap_or(name);
        self.container_dir(name, tag)
            .join(format!("{short}-{tag}.sif"))
    }

    pub fn view_dir(&self, view: &str) -> PathBuf {
        self.views_base.join(view)
    }

    pub fn view_config_path(&self, view: &str) -> PathBuf {
        self.view_dir(view).join(VIEW_CONFIG_FILE_NAME)
    }

    /// `(name, tag)` for a module directory under the module root.
    pub fn module_identity(&self, module_dir: &Path) -> Option<(String, String)> {
        let relative = module_dir.strip_prefix(&self.module_base).ok()?;
        let tag = relative.file_name()?.to_str()?.to_string();
        let name = relative
            .parent()?
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?
            .join("/");
        if name.is_empty() {
            return None;
        }
        Some((name, tag))
    }

    pub fn view_link_path(&self, view: &str, name: &str, tag: &str) -> PathBuf {
        self.view_dir(view)
            .join(name)
            .join(self.module_sys.view_link_name(tag))
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [&self.module_base, &self.container_base, &self.views_base] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
