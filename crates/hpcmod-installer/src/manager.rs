use anyhow::{anyhow, Context, Result};
use hpcmod_core::traits::{
    Confirm, InstallOptions, ModuleManager, RecipeRegistry, UninstallRequest,
};
use hpcmod_core::{InstalledIndex, LifecycleError, RecipeConfig, SoftwareName};
use std::fs;
use std::path::{Path, PathBuf};

use crate::container::{sha256_file, ContainerPuller};
use crate::fs_utils::{
    current_unix_nanos, make_executable, prune_empty_dirs, remove_file_if_exists,
};
use crate::layout::ModuleLayout;
use crate::modulefile::{render_module_file, render_wrapper_script, ModuleFileContext};
use crate::receipts::{
    read_installed_index, read_module_receipt, write_module_receipt, ModuleReceipt,
};
use crate::views::FsViewManager;

/// Module manager backed by the module, container and view roots of a [`ModuleLayout`].
pub struct FsModuleManager<R> {
    layout: ModuleLayout,
    registry: R,
    puller: Box<dyn ContainerPuller>,
    confirm: Box<dyn Confirm>,
    views: FsViewManager,
    wrapper_scripts: bool,
}

struct AcquiredContainer {
    container: String,
    sha256: Option<String>,
    managed: bool,
}

impl<R: RecipeRegistry> FsModuleManager<R> {
    pub fn new(
        layout: ModuleLayout,
        registry: R,
        puller: Box<dyn ContainerPuller>,
        confirm: Box<dyn Confirm>,
    ) -> Self {
        let views = FsViewManager::new(layout.clone());
        Self {
            layout,
            registry,
            puller,
            confirm,
            views,
            wrapper_scripts: true,
        }
    }

    pub fn with_wrapper_scripts(mut self, enabled: bool) -> Self {
        self.wrapper_scripts = enabled;
        self
    }

    pub fn layout(&self) -> &ModuleLayout {
        &self.layout
    }

    pub fn receipt(&self, name: &str, tag: &str) -> Result<Option<ModuleReceipt>> {
        read_module_receipt(&self.layout, name, tag)
    }

    fn install_tag(
        &self,
        name: &SoftwareName,
        recipe: &RecipeConfig,
        tag: &str,
        options: &InstallOptions,
    ) -> Result<PathBuf> {
        let module_dir = self.layout.module_dir(name.name(), tag);
        if !options.force && self.receipt(name.name(), tag)?.is_some() {
            tracing::debug!(module = %name.with_tag(tag), "already installed");
            return Ok(module_dir);
        }
        let fresh_dir = !module_dir.exists();

        let result = self.write_module(name, recipe, tag, options, &module_dir);
        if result.is_err() && fresh_dir {
            let _ = fs::remove_dir_all(&module_dir);
            let _ = prune_empty_dirs(
                &self.layout.software_dir(name.name()),
                self.layout.module_base(),
            );
        }
        result?;

        tracing::info!(
            module = %name.with_tag(tag),
            dir = %module_dir.display(),
            "installed module"
        );
        Ok(module_dir)
    }

    fn write_module(
        &self,
        name: &SoftwareName,
        recipe: &RecipeConfig,
        tag: &str,
        options: &InstallOptions,
        module_dir: &Path,
    ) -> Result<()> {
        let acquired = self.acquire_container(name.name(), recipe, tag, options)?;

        fs::create_dir_all(module_dir)
            .with_context(|| format!("failed to create {}", module_dir.display()))?;

        let tech = self.layout.container_tech();
        let bin_dir = self.layout.wrapper_bin_dir(name.name(), tag);
        let mut wrappers = Vec::new();
        if bin_dir.exists() {
            fs::remove_dir_all(&bin_dir)
                .with_context(|| format!("failed to clear {}", bin_dir.display()))?;
        }
        if self.wrapper_scripts && !recipe.aliases.is_empty() {
            fs::create_dir_all(&bin_dir)
                .with_context(|| format!("failed to create {}", bin_dir.display()))?;
            for (alias, command) in &recipe.aliases {
                let path = bin_dir.join(alias);
                fs::write(
                    &path,
                    render_wrapper_script(tech, &acquired.container, command),
                )
                .with_context(|| format!("failed to write wrapper: {}", path.display()))?;
                make_executable(&path)?;
                wrappers.push(alias.clone());
            }
        }

        let module_file = self.layout.module_file_path(name.name(), tag);
        let rendered = render_module_file(
            self.layout.module_sys(),
            &ModuleFileContext {
                name: name.name(),
                tag,
                recipe,
                container_tech: tech,
                container: &acquired.container,
                wrapper_bin: (!wrappers.is_empty()).then_some(bin_dir.as_path()),
            },
        );
        fs::write(&module_file, rendered)
            .with_context(|| format!("failed to write module file: {}", module_file.display()))?;

        write_module_receipt(
            &self.layout,
            &ModuleReceipt {
                name: name.name().to_string(),
                tag: tag.to_string(),
                module_sys: self.layout.module_sys(),
                container_tech: tech,
                container: acquired.container,
                container_sha256: acquired.sha256,
                container_managed: acquired.managed,
                wrappers,
                installed_at_unix_nanos: current_unix_nanos()?,
            },
        )?;
        Ok(())
    }

    fn acquire_container(
        &self,
        name: &str,
        recipe: &RecipeConfig,
        tag: &str,
        options: &InstallOptions,
    ) -> Result<AcquiredContainer> {
        let tech = self.layout.container_tech();

        if let Some(image) = &options.container_image {
            if !image.is_file() {
                return Err(anyhow!("container image not found: {}", image.display()));
            }
            if options.keep_path {
                let path = fs::canonicalize(image)
                    .with_context(|| format!("failed to resolve {}", image.display()))?;
                return Ok(AcquiredContainer {
                    sha256: Some(sha256_file(&path)?),
                    container: path.display().to_string(),
                    managed: false,
                });
            }
            let destination = self.layout.container_image_path(name, tag);
            if !destination.is_file() {
                create_parent(&destination)?;
                fs::copy(image, &destination).with_context(|| {
                    format!(
                        "failed to copy {} to {}",
                        image.display(),
                        destination.display()
                    )
                })?;
            }
            return Ok(AcquiredContainer {
                sha256: Some(sha256_file(&destination)?),
                container: destination.display().to_string(),
                managed: true,
            });
        }

        let source = image_source(recipe, name, tag)?;
        if !tech.stores_image_file() {
            let image = crate::container::strip_scheme(&source);
            if self.puller.has_image(tech, image)? {
                tracing::debug!(container = image, "reusing container");
            } else {
                self.puller
                    .pull(tech, &source, &self.layout.container_dir(name, tag))?;
            }
            return Ok(AcquiredContainer {
                container: image.to_string(),
                sha256: None,
                managed: true,
            });
        }

        let destination = self.layout.container_image_path(name, tag);
        if destination.is_file() {
            tracing::debug!(container = %destination.display(), "reusing container");
        } else {
            create_parent(&destination)?;
            self.puller.pull(tech, &source, &destination)?;
            if !destination.is_file() {
                return Err(anyhow!(
                    "pull of {source} did not produce {}",
                    destination.display()
                ));
            }
        }
        Ok(AcquiredContainer {
            sha256: Some(sha256_file(&destination)?),
            container: destination.display().to_string(),
            managed: true,
        })
    }

    fn remove_tag(&self, name: &str, tag: &str, keep_container: bool) -> Result<()> {
        let receipt = self.receipt(name, tag)?;
        let module_dir = self.layout.module_dir(name, tag);

        for view in self.views.remove_module_dir_from_all(&module_dir)? {
            tracing::debug!(view, module = %format!("{name}:{tag}"), "unlinked from view");
        }

        if module_dir.exists() {
            fs::remove_dir_all(&module_dir)
                .with_context(|| format!("failed to remove {}", module_dir.display()))?;
        }
        prune_empty_dirs(&self.layout.software_dir(name), self.layout.module_base())?;

        if !keep_container {
            if let Some(receipt) = receipt.filter(|receipt| receipt.container_managed) {
                self.remove_container(name, tag, &receipt)?;
            }
        }
        tracing::info!(module = %format!("{name}:{tag}"), keep_container, "uninstalled module");
        Ok(())
    }

    fn remove_container(&self, name: &str, tag: &str, receipt: &ModuleReceipt) -> Result<()> {
        if receipt.container_tech.stores_image_file() {
            let path = PathBuf::from(&receipt.container);
            remove_file_if_exists(&path)
                .with_context(|| format!("failed to remove container: {}", path.display()))?;
        } else if let Err(err) = self
            .puller
            .remove_image(receipt.container_tech, &receipt.container)
        {
            tracing::warn!(image = %receipt.container, "failed to remove image: {err:#}");
        }

        let container_dir = self.layout.container_dir(name, tag);
        prune_empty_dirs(&container_dir, self.layout.container_base())
    }
}

impl<R: RecipeRegistry> ModuleManager for FsModuleManager<R> {
    fn install(&self, name: &SoftwareName, options: &InstallOptions) -> Result<PathBuf> {
        let recipe = self.registry.load_config(name.name())?;
        let tag = match name.tag() {
            Some(tag) => tag.to_string(),
            None => recipe
                .latest_tag()
                .ok_or_else(|| LifecycleError::NoLatestVersion {
                    name: name.name().to_string(),
                })?
                .to_string(),
        };

        recipe.check_installable(name.name(), &tag, options.container_image.is_some())?;

        self.install_tag(name, &recipe, &tag, options)
    }

    fn uninstall(&self, name: &SoftwareName, request: UninstallRequest) -> Result<bool> {
        let index = self.list(None)?;
        let tags = match name.tag() {
            Some(tag) if index.contains_tag(name.name(), tag) => vec![tag.to_string()],
            Some(_) => Vec::new(),
            None => index.tags(name.name()).to_vec(),
        };
        if tags.is_empty() {
            tracing::debug!(module = %name, "nothing to uninstall");
            return Ok(false);
        }

        if !request.force {
            let message = format!("Are you sure you want to uninstall {name}?");
            if !self.confirm.confirm(&message)? {
                return Ok(false);
            }
        }

        for tag in &tags {
            self.remove_tag(name.name(), tag, request.keep_container)?;
        }
        Ok(true)
    }

    fn list(&self, pattern: Option<&str>) -> Result<InstalledIndex> {
        Ok(read_installed_index(&self.layout)?.filtered(pattern))
    }

    fn module_dir(&self, name: &str, tag: &str) -> PathBuf {
        self.layout.module_dir(name, tag)
    }
}

/// Scheme-qualified pull source for `name:tag`.
fn image_source(recipe: &RecipeConfig, name: &str, tag: &str) -> Result<String> {
    if let Some(docker) = recipe.docker.as_deref().filter(|uri| !uri.is_empty()) {
        return Ok(format!("docker://{docker}:{tag}"));
    }
    if let Some(oras) = recipe.oras.as_deref().filter(|uri| !uri.is_empty()) {
        return Ok(format!("oras://{oras}:{tag}"));
    }
    Err(anyhow!("recipe for {name} declares no container image"))
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}
