use std::path::PathBuf;

use anyhow::Result;
use hpcmod_core::traits::{confirm_or_forced, InstallOptions, UninstallRequest};
use hpcmod_core::SoftwareName;

use crate::decide::UpgradeAction;
use crate::report::BatchEntry;
use crate::resolve::UpgradePlan;
use crate::Lifecycle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    UpToDate { latest: String },
    /// Dry run found a newer tag; nothing was changed.
    Available { installed: Vec<String>, latest: String },
    Upgraded(UpgradeSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeSummary {
    pub previous: Vec<String>,
    pub latest: String,
    pub module_dir: PathBuf,
    /// `false` when the old tags were kept, by choice or by the module manager.
    pub old_removed: bool,
    pub views: ViewsOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewsOutcome {
    /// No view held a previous version.
    NoViews,
    Declined(Vec<String>),
    Installed(Vec<String>),
}

impl Lifecycle<'_> {
    pub fn upgrade(&self, name: &SoftwareName) -> Result<UpgradeOutcome> {
        let plan = self.resolve(name)?;
        match plan.action {
            UpgradeAction::NoActionLatestInstalled => {
                tracing::info!(
                    software = %plan.name,
                    latest = %plan.latest,
                    "latest version already installed"
                );
                Ok(UpgradeOutcome::UpToDate {
                    latest: plan.latest,
                })
            }
            UpgradeAction::UpgradeAvailable if self.options.dry_run => {
                Ok(UpgradeOutcome::Available {
                    installed: plan.installed,
                    latest: plan.latest,
                })
            }
            UpgradeAction::UpgradeAvailable => {
                self.apply_upgrade(plan).map(UpgradeOutcome::Upgraded)
            }
        }
    }

    /// Upgrades every installed software. Entries fail independently.
    pub fn upgrade_all(&self) -> Result<Vec<BatchEntry<UpgradeOutcome>>> {
        self.upgrade_all_with_progress(&mut |_, _| {})
    }

    /// [`Self::upgrade_all`], calling `progress(done, total)` after each entry.
    pub fn upgrade_all_with_progress(
        &self,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<BatchEntry<UpgradeOutcome>>> {
        let installed = self.modules.list(None)?;
        let total = installed.len();
        let mut entries = Vec::with_capacity(total);
        for name in installed.names() {
            let name = SoftwareName::bare(name);
            let result = self.upgrade(&name);
            if let Err(err) = &result {
                tracing::warn!(software = %name, "upgrade did not complete: {err:#}");
            }
            entries.push(BatchEntry { name, result });
            progress(entries.len(), total);
        }
        Ok(entries)
    }

    fn apply_upgrade(&self, plan: UpgradePlan) -> Result<UpgradeSummary> {
        let name = plan.name;
        tracing::info!(software = %name, latest = %plan.latest, "upgrading to latest version");

        let module_dirs = plan
            .installed
            .iter()
            .map(|tag| self.modules.module_dir(name.name(), tag))
            .collect::<Vec<_>>();
        let captured = self.capture_views(&module_dirs)?;

        let message = format!(
            "Do you want to uninstall the previous version(s) of {name} ({})?",
            plan.installed.join(", ")
        );
        let old_removed = if confirm_or_forced(self.confirm, &message, self.options.force)? {
            self.modules.uninstall(
                &name,
                UninstallRequest {
                    force: true,
                    keep_container: false,
                },
            )?
        } else {
            false
        };
        if !old_removed {
            tracing::info!(software = %name, "old versions were preserved");
        }

        let latest = name.with_tag(&plan.latest);
        let module_dir = self.modules.install(&latest, &InstallOptions::default())?;

        let views = if captured.is_empty() {
            ViewsOutcome::NoViews
        } else {
            let message = format!(
                "Do you also want to install the latest version of {name} to the view(s) of the previous version(s)?"
            );
            if confirm_or_forced(self.confirm, &message, self.options.force)? {
                ViewsOutcome::Installed(self.repropagate(&module_dir, &captured, &latest)?)
            } else {
                ViewsOutcome::Declined(captured.into_iter().collect())
            }
        };

        Ok(UpgradeSummary {
            previous: plan.installed,
            latest: plan.latest,
            module_dir,
            old_removed,
            views,
        })
    }
}
