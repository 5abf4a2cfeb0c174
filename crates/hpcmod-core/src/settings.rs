use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{ContainerTech, LifecycleError, ModuleSystem};

pub const SETTINGS_ENV: &str = "HPCMOD_SETTINGS";
pub const ROOT_ENV: &str = "HPCMOD_ROOT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub module_base: PathBuf,
    pub container_base: PathBuf,
    pub views_base: PathBuf,
    pub module_sys: ModuleSystem,
    pub container_tech: ContainerTech,
    pub registry: Vec<String>,
    pub namespace: Option<String>,
    pub default_view: Option<String>,
    pub wrapper_scripts: bool,
}

/// On-disk shape; every field optional so partial files fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    module_base: Option<PathBuf>,
    container_base: Option<PathBuf>,
    views_base: Option<PathBuf>,
    module_sys: Option<ModuleSystem>,
    container_tech: Option<ContainerTech>,
    registry: Option<Vec<String>>,
    namespace: Option<String>,
    default_view: Option<String>,
    wrapper_scripts: Option<bool>,
}

impl Settings {
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            module_base: root.join("modules"),
            container_base: root.join("containers"),
            views_base: root.join("views"),
            module_sys: ModuleSystem::default(),
            container_tech: ContainerTech::default(),
            registry: vec![root.join("registry").display().to_string()],
            namespace: None,
            default_view: None,
            wrapper_scripts: true,
        }
    }

    pub fn from_toml_str(input: &str, root: &Path) -> Result<Self> {
        let file: SettingsFile = toml::from_str(input).context("failed to parse settings")?;
        let defaults = Self::with_root(root);
        let relative_to_root = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                root.join(path)
            }
        };

        Ok(Self {
            module_base: file
                .module_base
                .map(relative_to_root)
                .unwrap_or(defaults.module_base),
            container_base: file
                .container_base
                .map(relative_to_root)
                .unwrap_or(defaults.container_base),
            views_base: file
                .views_base
                .map(relative_to_root)
                .unwrap_or(defaults.views_base),
            module_sys: file.module_sys.unwrap_or(defaults.module_sys),
            container_tech: file.container_tech.unwrap_or(defaults.container_tech),
            registry: file.registry.unwrap_or(defaults.registry),
            namespace: file.namespace.filter(|ns| !ns.trim().is_empty()),
            default_view: file.default_view.filter(|view| !view.trim().is_empty()),
            wrapper_scripts: file.wrapper_scripts.unwrap_or(defaults.wrapper_scripts),
        })
    }

    /// Loads `path`, or the defaults rooted beside it when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if !path.exists() {
            return Ok(Self::with_root(root));
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading settings: {}", path.display()))?;
        Self::from_toml_str(&raw, &root)
            .with_context(|| format!("failed parsing settings: {}", path.display()))
    }

    /// Applies one `key:value` override, as given with `-c` on the command line.
    pub fn apply_override(&mut self, param: &str) -> Result<()> {
        let Some((key, value)) = param.split_once(':') else {
            return Err(LifecycleError::InvalidArgument(format!(
                "setting override '{param}' must look like key:value"
            ))
            .into());
        };
        let value = value.trim();
        match key.trim() {
            "module_base" => self.module_base = PathBuf::from(value),
            "container_base" => self.container_base = PathBuf::from(value),
            "views_base" => self.views_base = PathBuf::from(value),
            "module_sys" => self.module_sys = ModuleSystem::parse(value)?,
            "container_tech" => self.container_tech = ContainerTech::parse(value)?,
            "registry" => {
                self.registry = value
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            "namespace" => self.namespace = non_empty(value),
            "default_view" => self.default_view = non_empty(value),
            "wrapper_scripts" => {
                self.wrapper_scripts = value
                    .parse()
                    .with_context(|| format!("wrapper_scripts must be true or false: {value}"))?
            }
            other => {
                return Err(
                    LifecycleError::InvalidArgument(format!("unknown setting '{other}'")).into(),
                )
            }
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, params: &[String]) -> Result<()> {
        for param in params {
            self.apply_override(param)?;
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn default_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(ROOT_ENV) {
        if !root.trim().is_empty() {
            return Ok(PathBuf::from(root));
        }
    }
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows user root")?;
        return Ok(PathBuf::from(app_data).join("hpcmod"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve user root")?;
    Ok(PathBuf::from(home).join(".hpcmod"))
}

/// `--settings-file`, then `$HPCMOD_SETTINGS`, then `<root>/settings.toml`.
pub fn resolve_settings_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(SETTINGS_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(default_root()?.join("settings.toml"))
}
