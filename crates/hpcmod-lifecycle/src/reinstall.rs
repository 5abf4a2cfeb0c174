use std::path::PathBuf;

use anyhow::{anyhow, Result};
use hpcmod_core::traits::{InstallOptions, UninstallRequest};
use hpcmod_core::{LifecycleError, SoftwareName};

use crate::report::BatchEntry;
use crate::Lifecycle;

/// Per-tag results of reinstalling one software.
#[derive(Debug)]
pub struct ReinstallReport {
    pub name: SoftwareName,
    pub tags: Vec<TagOutcome>,
}

#[derive(Debug)]
pub struct TagOutcome {
    pub tag: String,
    pub result: Result<ReinstalledTag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReinstalledTag {
    pub module_dir: PathBuf,
    pub views: Vec<String>,
}

impl ReinstallReport {
    pub fn succeeded(&self) -> usize {
        self.tags.iter().filter(|tag| tag.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.tags.len() - self.succeeded()
    }

    pub fn ensure_succeeded(&self) -> Result<()> {
        let failed = self
            .tags
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .map(|outcome| outcome.tag.as_str())
            .collect::<Vec<_>>();
        if failed.is_empty() {
            return Ok(());
        }
        Err(anyhow!(
            "reinstall of {} failed for: {}",
            self.name.name(),
            failed.join(", ")
        ))
    }
}

impl Lifecycle<'_> {
    /// Reinstalls one tag, or every installed tag of a bare name.
    ///
    /// The container artifact is kept unless `update_containers` is set. Tags
    /// are processed independently; per-tag failures land in the report.
    pub fn reinstall(
        &self,
        name: &SoftwareName,
        update_containers: bool,
    ) -> Result<ReinstallReport> {
        self.reinstall_with(name, update_containers, &InstallOptions::default())
    }

    /// Like [`Lifecycle::reinstall`], passing `install` through to every
    /// reinstall. A tag the registry no longer lists is reported as failed
    /// and left installed.
    pub fn reinstall_with(
        &self,
        name: &SoftwareName,
        update_containers: bool,
        install: &InstallOptions,
    ) -> Result<ReinstallReport> {
        let installed = self
            .modules
            .list(Some(name.name()))?
            .tags(name.name())
            .to_vec();
        let targets = match name.tag() {
            Some(tag) if installed.iter().any(|existing| existing == tag) => {
                vec![tag.to_string()]
            }
            Some(_) => Vec::new(),
            None => installed,
        };
        if targets.is_empty() {
            return Err(LifecycleError::not_installed(name.to_string()).into());
        }

        let recipe = self.registry.load_config(name.name())?;
        let extra_view = self.default_view_for_reinstall()?;
        let mut tags = Vec::with_capacity(targets.len());
        for tag in targets {
            let result = recipe
                .check_installable(name.name(), &tag, install.container_image.is_some())
                .map_err(anyhow::Error::from)
                .and_then(|()| {
                    self.reinstall_tag(name.name(), &tag, update_containers, install, extra_view)
                });
            if let Err(err) = &result {
                tracing::warn!(software = %name.with_tag(&tag), "reinstall failed: {err:#}");
            }
            tags.push(TagOutcome { tag, result });
        }

        Ok(ReinstallReport {
            name: name.without_tag(),
            tags,
        })
    }

    /// Reinstalls every tag of every installed software.
    pub fn reinstall_all(
        &self,
        update_containers: bool,
    ) -> Result<Vec<BatchEntry<ReinstallReport>>> {
        self.reinstall_all_with_progress(update_containers, &mut |_, _| {})
    }

    pub fn reinstall_all_with_progress(
        &self,
        update_containers: bool,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<BatchEntry<ReinstallReport>>> {
        let installed = self.modules.list(None)?;
        let total = installed.len();
        let mut entries = Vec::with_capacity(total);
        for name in installed.names() {
            let name = SoftwareName::bare(name);
            let result = self.reinstall(&name, update_containers);
            if let Err(err) = &result {
                tracing::warn!(software = %name, "reinstall did not complete: {err:#}");
            }
            entries.push(BatchEntry { name, result });
            progress(entries.len(), total);
        }
        Ok(entries)
    }

    fn reinstall_tag(
        &self,
        name: &str,
        tag: &str,
        update_containers: bool,
        install: &InstallOptions,
        extra_view: Option<&str>,
    ) -> Result<ReinstalledTag> {
        let qualified = SoftwareName::qualified(name, tag);
        let mut views = self.capture_views(&[self.modules.module_dir(name, tag)])?;

        self.modules.uninstall(
            &qualified,
            UninstallRequest {
                force: true,
                keep_container: !update_containers,
            },
        )?;
        let module_dir = self.modules.install(&qualified, install)?;
        tracing::info!(software = %qualified, update_containers, "reinstalled");

        if let Some(view) = extra_view {
            views.insert(view.to_string());
        }
        let views = self.repropagate(&module_dir, &views, &qualified)?;
        Ok(ReinstalledTag { module_dir, views })
    }

    fn default_view_for_reinstall(&self) -> Result<Option<&str>> {
        if self.options.no_view {
            return Ok(None);
        }
        let Some(view) = self.options.default_view.as_deref() else {
            return Ok(None);
        };
        if self.views.view_names()?.iter().any(|existing| existing == view) {
            return Ok(Some(view));
        }
        tracing::warn!(view, "default view does not exist; skipping");
        Ok(None)
    }
}
