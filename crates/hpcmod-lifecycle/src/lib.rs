//! Upgrade and reinstall orchestration over the collaborator traits in
//! [`hpcmod_core::traits`].
//!
//! Every operation runs against an explicit [`Lifecycle`] context; nothing here
//! touches the filesystem directly.

mod decide;
mod reinstall;
mod report;
mod resolve;
mod upgrade;
mod views;

use hpcmod_core::traits::{Confirm, ModuleManager, RecipeRegistry, ViewManager};

pub use decide::{decide, UpgradeAction};
pub use reinstall::{ReinstallReport, ReinstalledTag, TagOutcome};
pub use report::{
    build_reinstall_report, build_upgrade_report, ensure_batch_succeeded,
    format_reinstall_summary_line, format_upgrade_summary_line, BatchEntry, BatchReport,
    DryRunReport,
};
pub use resolve::UpgradePlan;
pub use upgrade::{UpgradeOutcome, UpgradeSummary, ViewsOutcome};

/// Flags shared by every lifecycle operation of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Answer yes to every confirmation.
    pub force: bool,
    /// Report what an upgrade would do without mutating anything.
    pub dry_run: bool,
    /// View every reinstalled module is also added to.
    pub default_view: Option<String>,
    /// Skip `default_view`.
    pub no_view: bool,
}

pub struct Lifecycle<'a> {
    registry: &'a dyn RecipeRegistry,
    modules: &'a dyn ModuleManager,
    views: &'a dyn ViewManager,
    confirm: &'a dyn Confirm,
    options: LifecycleOptions,
}

impl<'a> Lifecycle<'a> {
    pub fn new(
        registry: &'a dyn RecipeRegistry,
        modules: &'a dyn ModuleManager,
        views: &'a dyn ViewManager,
        confirm: &'a dyn Confirm,
        options: LifecycleOptions,
    ) -> Self {
        Self {
            registry,
            modules,
            views,
            confirm,
            options,
        }
    }
}
