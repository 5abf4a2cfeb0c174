use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::LifecycleError;

/// Registry metadata for one recipe, as read from its `container.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeConfig {
    #[serde(default)]
    pub docker: Option<String>,
    #[serde(default)]
    pub oras: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub maintainer: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub latest: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl RecipeConfig {
    pub fn from_yaml_str(input: &str) -> anyhow::Result<Self> {
        let recipe: Self =
            serde_yaml_ng::from_str(input).context("failed to parse container.yaml")?;
        if recipe.latest.len() > 1 {
            return Err(anyhow!(
                "recipe declares {} latest versions; expected exactly one",
                recipe.latest.len()
            ));
        }
        for alias in recipe.aliases.keys() {
            if alias.is_empty() || alias.contains('/') || alias.chars().any(char::is_whitespace)
            {
                return Err(anyhow!("invalid alias name '{alias}'"));
            }
        }
        Ok(recipe)
    }

    /// The single tag declared under `latest`, if any.
    pub fn latest_tag(&self) -> Option<&str> {
        self.latest
            .keys()
            .map(String::as_str)
            .find(|tag| !tag.trim().is_empty())
    }

    /// Image reference without a tag, preferring `docker` over `oras`.
    pub fn image_uri(&self) -> Option<&str> {
        self.docker
            .as_deref()
            .or(self.oras.as_deref())
            .filter(|uri| !uri.trim().is_empty())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag) || self.latest.contains_key(tag)
    }

    /// Rejects a tag the registry no longer lists. A local image bypasses the
    /// check, as does a recipe that lists no tags at all.
    pub fn check_installable(
        &self,
        name: &str,
        tag: &str,
        local_image: bool,
    ) -> Result<(), LifecycleError> {
        if local_image || self.tags.is_empty() || self.has_tag(tag) {
            return Ok(());
        }
        Err(LifecycleError::InvalidArgument(format!(
            "'{tag}' is not a known version of {name}"
        )))
    }
}
