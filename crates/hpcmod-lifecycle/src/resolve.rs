use anyhow::Result;
use hpcmod_core::{LifecycleError, SoftwareName};

use crate::decide::{decide, UpgradeAction};
use crate::Lifecycle;

/// Installed tags, latest tag and the resulting action for one software.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePlan {
    pub name: SoftwareName,
    /// In install order.
    pub installed: Vec<String>,
    pub latest: String,
    pub action: UpgradeAction,
}

impl Lifecycle<'_> {
    /// Resolves `name` against the registry and the installed index.
    ///
    /// Fails with `InvalidArgument` for a tag-qualified name, `NotFound` when no
    /// registry knows the recipe, `NotInstalled` when no tag is installed and
    /// `NoLatestVersion` when the recipe declares no latest tag, in that order.
    pub fn resolve(&self, name: &SoftwareName) -> Result<UpgradePlan> {
        name.require_bare("upgrade")?;
        let recipe = self.registry.load_config(name.name())?;

        let installed = self
            .modules
            .list(Some(name.name()))?
            .tags(name.name())
            .to_vec();
        if installed.is_empty() {
            return Err(LifecycleError::not_installed(name.name()).into());
        }

        let latest = recipe
            .latest_tag()
            .ok_or_else(|| LifecycleError::NoLatestVersion {
                name: name.name().to_string(),
            })?
            .to_string();
        let action = decide(&installed, &latest);
        tracing::debug!(
            software = %name,
            ?installed,
            latest = %latest,
            ?action,
            "resolved upgrade plan"
        );

        Ok(UpgradePlan {
            name: name.clone(),
            installed,
            latest,
            action,
        })
    }
}
