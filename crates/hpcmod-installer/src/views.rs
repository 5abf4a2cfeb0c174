use anyhow::{anyhow, Context, Result};
use hpcmod_core::traits::ViewManager;
use hpcmod_core::{LifecycleError, SoftwareName};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fs_utils::{prune_empty_dirs, remove_file_if_exists};
use crate::layout::{ModuleLayout, VIEW_CONFIG_FILE_NAME};

/// Membership record kept beside a view's symlinks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub name: String,
    #[serde(default)]
    pub modules: Vec<String>,
}

/// Views as directories of symlinks to installed module files.
#[derive(Debug, Clone)]
pub struct FsViewManager {
    layout: ModuleLayout,
}

impl FsViewManager {
    pub fn new(layout: ModuleLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ModuleLayout {
        &self.layout
    }

    pub fn exists(&self, view: &str) -> bool {
        self.layout.view_config_path(view).is_file()
    }

    pub fn create(&self, view: &str) -> Result<PathBuf> {
        validate_view_name(view)?;
        let dir = self.layout.view_dir(view);
        if self.exists(view) {
            return Err(anyhow!("view '{view}' already exists: {}", dir.display()));
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create view: {}", dir.display()))?;
        self.save_config(&ViewConfig {
            name: view.to_string(),
            modules: Vec::new(),
        })?;
        tracing::info!(view, "created view");
        Ok(dir)
    }

    pub fn delete(&self, view: &str) -> Result<()> {
        self.require_view(view)?;
        let dir = self.layout.view_dir(view);
        fs::remove_dir_all(&dir)
            .with_context(|| format!("failed to delete view: {}", dir.display()))?;
        tracing::info!(view, "deleted view");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let base = self.layout.views_base();
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut views = Vec::new();
        for entry in fs::read_dir(base)
            .with_context(|| format!("failed to read views directory: {}", base.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if !entry.path().join(VIEW_CONFIG_FILE_NAME).is_file() {
                continue;
            }
            views.push(entry.file_name().to_string_lossy().to_string());
        }
        views.sort();
        Ok(views)
    }

    /// Module identifiers (`name:tag`) recorded for `view`.
    pub fn members(&self, view: &str) -> Result<Vec<String>> {
        Ok(self.load_config(view)?.modules)
    }

    pub fn uninstall_module(&self, view: &str, name: &str, tag: &str) -> Result<bool> {
        self.require_view(view)?;
        let link = self.layout.view_link_path(view, name, tag);
        let existed = fs::symlink_metadata(&link).is_ok();
        remove_file_if_exists(&link)
            .with_context(|| format!("failed to remove view entry: {}", link.display()))?;
        if let Some(parent) = link.parent() {
            prune_empty_dirs(parent, &self.layout.view_dir(view))?;
        }

        let mut config = self.load_config(view)?;
        let member = module_id(name, tag);
        let before = config.modules.len();
        config.modules.retain(|existing| existing != &member);
        if config.modules.len() != before {
            self.save_config(&config)?;
        }
        if existed {
            tracing::info!(view, module = %member, "removed module from view");
        }
        Ok(existed)
    }

    /// Removes `module_dir` from every view holding it; returns those views.
    pub fn remove_module_dir_from_all(&self, module_dir: &Path) -> Result<Vec<String>> {
        let Some((name, tag)) = self.layout.module_identity(module_dir) else {
            return Ok(Vec::new());
        };
        let mut removed = Vec::new();
        for view in self.list()? {
            if self.uninstall_module(&view, &name, &tag)? {
                removed.push(view);
            }
        }
        Ok(removed)
    }

    fn require_view(&self, view: &str) -> Result<()> {
        validate_view_name(view)?;
        if !self.exists(view) {
            return Err(anyhow!("view '{view}' does not exist"));
        }
        Ok(())
    }

    fn load_config(&self, view: &str) -> Result<ViewConfig> {
        self.require_view(view)?;
        let path = self.layout.view_config_path(view);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading view config: {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed parsing view config: {}", path.display()))
    }

    fn save_config(&self, config: &ViewConfig) -> Result<()> {
        let mut config = config.clone();
        config.modules.sort();
        config.modules.dedup();
        let path = self.layout.view_config_path(&config.name);
        let content = toml::to_string(&config)
            .with_context(|| format!("failed serializing view config: {}", path.display()))?;
        fs::write(&path, content)
            .with_context(|| format!("failed writing view config: {}", path.display()))
    }
}

impl ViewManager for FsViewManager {
    fn view_names(&self) -> Result<Vec<String>> {
        self.list()
    }

    fn contains(&self, view: &str, module_dir: &Path) -> Result<bool> {
        let Some((name, tag)) = self.layout.module_identity(module_dir) else {
            return Ok(false);
        };
        let link = self.layout.view_link_path(view, &name, &tag);
        Ok(fs::symlink_metadata(link).is_ok())
    }

    fn install_module(&self, view: &str, name: &SoftwareName, module_dir: &Path) -> Result<()> {
        self.require_view(view)?;
        let Some((module_name, tag)) = self.layout.module_identity(module_dir) else {
            return Err(anyhow!(
                "{} is not inside the module root {}",
                module_dir.display(),
                self.layout.module_base().display()
            ));
        };
        if module_name != name.name() {
            return Err(LifecycleError::InvalidArgument(format!(
                "module directory {} does not belong to {}",
                module_dir.display(),
                name.name()
            ))
            .into());
        }

        let target = module_dir.join(self.layout.module_sys().module_file_name());
        if !target.is_file() {
            return Err(LifecycleError::not_installed(name.with_tag(&tag).to_string()).into());
        }

        let link = self.layout.view_link_path(view, &module_name, &tag);
        if fs::symlink_metadata(&link).is_ok() {
            if view_entry_points_to(&link, &target) {
                tracing::debug!(view, module = %name.with_tag(&tag), "module already in view");
                return Ok(());
            }
            remove_file_if_exists(&link)
                .with_context(|| format!("failed to replace view entry: {}", link.display()))?;
        }
        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        create_view_entry(&target, &link)?;

        let mut config = self.load_config(view)?;
        config.modules.push(module_id(&module_name, &tag));
        self.save_config(&config)?;
        tracing::info!(view, module = %name.with_tag(&tag), "added module to view");
        Ok(())
    }
}

fn module_id(name: &str, tag: &str) -> String {
    format!("{name}:{tag}")
}

fn validate_view_name(view: &str) -> Result<()> {
    if view.is_empty()
        || view == "."
        || view == ".."
        || view.contains('/')
        || view.contains('\\')
        || view.chars().any(char::is_whitespace)
    {
        return Err(LifecycleError::InvalidArgument(format!("invalid view name '{view}'")).into());
    }
    Ok(())
}

#[cfg(unix)]
fn view_entry_points_to(link: &Path, target: &Path) -> bool {
    fs::read_link(link)
        .map(|existing| existing == target)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn view_entry_points_to(link: &Path, target: &Path) -> bool {
    match (fs::read(link), fs::read(target)) {
        (Ok(existing), Ok(expected)) => existing == expected,
        _ => false,
    }
}

fn create_view_entry(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!(
                "failed to create symlink {} -> {}",
                link.display(),
                target.display()
            )
        })
    }

    #[cfg(not(unix))]
    {
        fs::copy(target, link)
            .map(|_| ())
            .with_context(|| format!("failed to write view entry: {}", link.display()))
    }
}
