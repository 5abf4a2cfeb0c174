use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use hpcmod_core::SoftwareName;

use crate::Lifecycle;

impl Lifecycle<'_> {
    /// Views holding any of `module_dirs`. Must run before those modules are
    /// uninstalled, since uninstall drops the membership.
    pub fn capture_views(&self, module_dirs: &[PathBuf]) -> Result<BTreeSet<String>> {
        let mut captured = BTreeSet::new();
        for view in self.views.view_names()? {
            for module_dir in module_dirs {
                if self.views.contains(&view, module_dir)? {
                    captured.insert(view.clone());
                    break;
                }
            }
        }
        Ok(captured)
    }

    /// Adds `name` at `module_dir` to each view. Every view is attempted; the
    /// call fails afterwards if any of them failed.
    pub fn repropagate(
        &self,
        module_dir: &Path,
        views: &BTreeSet<String>,
        name: &SoftwareName,
    ) -> Result<Vec<String>> {
        let mut installed = Vec::with_capacity(views.len());
        let mut failures = Vec::new();
        for view in views {
            match self.views.install_module(view, name, module_dir) {
                Ok(()) => {
                    tracing::info!(view, software = %name, "installed to view");
                    installed.push(view.clone());
                }
                Err(err) => {
                    tracing::warn!(view, software = %name, "failed to install to view: {err:#}");
                    failures.push(format!("{view}: {err:#}"));
                }
            }
        }

        if !failures.is_empty() {
            return Err(anyhow!(
                "failed to add {name} to {} view(s): {}",
                failures.len(),
                failures.join("; ")
            ));
        }
        Ok(installed)
    }
}
