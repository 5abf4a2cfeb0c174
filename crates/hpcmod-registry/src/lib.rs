use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use hpcmod_core::traits::RecipeRegistry;
use hpcmod_core::{LifecycleError, RecipeConfig, SoftwareName};

pub const RECIPE_FILE_NAME: &str = "container.yaml";

/// Recipes laid out as `<root>/<name>/container.yaml`.
#[derive(Debug, Clone)]
pub struct FilesystemRegistry {
    root: PathBuf,
}

impl FilesystemRegistry {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn recipe_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(RECIPE_FILE_NAME)
    }

    pub fn load(&self, name: &str) -> Result<Option<RecipeConfig>> {
        let path = self.recipe_path(name);
        if !path.is_file() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading recipe: {}", path.display()))?;
        let recipe = RecipeConfig::from_yaml_str(&raw)
            .with_context(|| format!("failed parsing recipe: {}", path.display()))?;
        Ok(Some(recipe))
    }

    /// Recipe names containing `needle`, sorted.
    pub fn search_names(&self, needle: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if self.root.is_dir() {
            collect_recipe_names(&self.root, &self.root, &mut names)?;
        }
        names.retain(|name| name.contains(needle));
        names.sort();
        Ok(names)
    }
}

fn collect_recipe_names(root: &Path, dir: &Path, names: &mut Vec<String>) -> Result<()> {
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read registry: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_recipe_names(root, &path, names)?;
            continue;
        }
        if path.file_name().and_then(|v| v.to_str()) != Some(RECIPE_FILE_NAME) {
            continue;
        }
        let Some(parent) = path.parent() else {
            continue;
        };
        let Ok(relative) = parent.strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !name.is_empty() {
            names.push(name);
        }
    }
    Ok(())
}

/// Recipes served over HTTP as `<base>/<name>/container.yaml`.
#[derive(Debug, Clone)]
pub struct RemoteRegistry {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl RemoteRegistry {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build registry http client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn recipe_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.base_url, name, RECIPE_FILE_NAME)
    }

    pub fn load(&self, name: &str) -> Result<Option<RecipeConfig>> {
        let url = self.recipe_url(name);
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("failed requesting recipe: {url}"))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .with_context(|| format!("registry refused recipe request: {url}"))?;
        let raw = response
            .text()
            .with_context(|| format!("failed reading recipe body: {url}"))?;
        let recipe = RecipeConfig::from_yaml_str(&raw)
            .with_context(|| format!("failed parsing recipe: {url}"))?;
        Ok(Some(recipe))
    }
}

#[derive(Debug, Clone)]
pub enum RegistrySource {
    Filesystem(FilesystemRegistry),
    Remote(RemoteRegistry),
}

impl RegistrySource {
    /// `http://` and `https://` locations are remote, anything else is a directory.
    pub fn from_location(location: &str) -> Result<Self> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(Self::Remote(RemoteRegistry::new(location)?));
        }
        Ok(Self::Filesystem(FilesystemRegistry::open(location)))
    }

    pub fn location(&self) -> String {
        match self {
            Self::Filesystem(registry) => registry.root().display().to_string(),
            Self::Remote(registry) => registry.base_url().to_string(),
        }
    }

    fn load(&self, name: &str) -> Result<Option<RecipeConfig>> {
        match self {
            Self::Filesystem(registry) => registry.load(name),
            Self::Remote(registry) => registry.load(name),
        }
    }
}

/// Configured registries in priority order; the first one that knows a recipe wins.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    sources: Vec<RegistrySource>,
}

impl Registries {
    pub fn new(sources: Vec<RegistrySource>) -> Self {
        Self { sources }
    }

    pub fn from_locations(locations: &[String]) -> Result<Self> {
        let sources = locations
            .iter()
            .map(|location| RegistrySource::from_location(location))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sources })
    }

    /// Searches filesystem registries; remote registries cannot be listed.
    pub fn search_names(&self, needle: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for source in &self.sources {
            if let RegistrySource::Filesystem(registry) = source {
                names.extend(registry.search_names(needle)?);
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

impl RecipeRegistry for Registries {
    fn load_config(&self, name: &str) -> Result<RecipeConfig> {
        let parsed = SoftwareName::parse(name)?;
        let bare = parsed.name();
        for source in &self.sources {
            if let Some(recipe) = source.load(bare)? {
                tracing::debug!(recipe = bare, registry = %source.location(), "loaded recipe");
                return Ok(recipe);
            }
        }
        Err(LifecycleError::not_found(bare).into())
    }
}

#[cfg(test)]
mod tests;
