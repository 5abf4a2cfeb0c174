//! Collaborator contracts consumed by the lifecycle orchestration.
//!
//! Implementations take `&self`: every mutation lands on the filesystem, and
//! in-memory fakes use interior mutability.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::{InstalledIndex, RecipeConfig, SoftwareName};

pub trait RecipeRegistry {
    /// Loads recipe metadata; unknown names fail with `LifecycleError::NotFound`.
    fn load_config(&self, name: &str) -> Result<RecipeConfig>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Local image to use instead of pulling.
    pub container_image: Option<PathBuf>,
    /// Reference `container_image` in place instead of copying it.
    pub keep_path: bool,
    /// Overwrite module files of an existing installation.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UninstallRequest {
    /// Skip the manager's own confirmation prompt.
    pub force: bool,
    /// Leave the container artifact in place.
    pub keep_container: bool,
}

pub trait ModuleManager {
    /// Installs `name`; a bare name installs the recipe's latest tag.
    fn install(&self, name: &SoftwareName, options: &InstallOptions) -> Result<PathBuf>;

    /// Removes one tag, or every tag of a bare name. Returns `false` when
    /// nothing was removed (declined, or not installed).
    fn uninstall(&self, name: &SoftwareName, request: UninstallRequest) -> Result<bool>;

    fn list(&self, pattern: Option<&str>) -> Result<InstalledIndex>;

    fn module_dir(&self, name: &str, tag: &str) -> PathBuf;
}

pub trait ViewManager {
    fn view_names(&self) -> Result<Vec<String>>;

    fn contains(&self, view: &str, module_dir: &Path) -> Result<bool>;

    /// Adds the module at `module_dir` to `view`. Already-present modules are a no-op.
    fn install_module(&self, view: &str, name: &SoftwareName, module_dir: &Path) -> Result<()>;
}

pub trait Confirm {
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// Asks `confirm` unless `forced`, in which case the answer is yes.
pub fn confirm_or_forced(confirm: &dyn Confirm, message: &str, forced: bool) -> Result<bool> {
    if forced {
        return Ok(true);
    }
    confirm.confirm(message)
}
