use std::fmt;

use crate::error::LifecycleError;

/// A recipe identifier such as `quay.io/biocontainers/samtools`, optionally
/// qualified with a version tag (`quay.io/biocontainers/samtools:1.20--h50ea8bc_0`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SoftwareName {
    name: String,
    tag: Option<String>,
}

impl SoftwareName {
    pub fn parse(raw: &str) -> Result<Self, LifecycleError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LifecycleError::InvalidArgument(
                "software name must not be empty".to_string(),
            ));
        }

        let mut parts = trimmed.split(':');
        let name = parts.next().unwrap_or_default();
        let tag = parts.next();
        if parts.next().is_some() {
            return Err(LifecycleError::InvalidArgument(format!(
                "'{trimmed}' must contain at most one ':' separating name and version"
            )));
        }

        validate_name(name, trimmed)?;
        match tag {
            None => Ok(Self::bare(name)),
            Some(tag) if tag.is_empty() => Err(LifecycleError::InvalidArgument(format!(
                "'{trimmed}' has an empty version after ':'"
            ))),
            Some(tag) => Ok(Self::qualified(name, tag)),
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: None,
        }
    }

    pub fn qualified(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: Some(tag.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_qualified(&self) -> bool {
        self.tag.is_some()
    }

    pub fn without_tag(&self) -> Self {
        Self::bare(self.name.clone())
    }

    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self::qualified(self.name.clone(), tag)
    }

    /// Rejects tag-qualified names for operations that work on every installed version.
    pub fn require_bare(&self, operation: &str) -> Result<(), LifecycleError> {
        match &self.tag {
            None => Ok(()),
            Some(_) => Err(LifecycleError::InvalidArgument(format!(
                "'hpcmod {operation}' takes a recipe without a version, got '{self}'"
            ))),
        }
    }

    /// Prefixes short names (no `/`) with the configured namespace.
    pub fn with_namespace(self, namespace: Option<&str>) -> Self {
        let Some(namespace) = namespace.map(|ns| ns.trim_end_matches('/')) else {
            return self;
        };
        if namespace.is_empty() || self.name.contains('/') {
            return self;
        }
        Self {
            name: format!("{namespace}/{}", self.name),
            tag: self.tag,
        }
    }
}

impl fmt::Display for SoftwareName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{}", self.name, tag),
            None => f.write_str(&self.name),
        }
    }
}

fn validate_name(name: &str, raw: &str) -> Result<(), LifecycleError> {
    if name.is_empty() {
        return Err(LifecycleError::InvalidArgument(format!(
            "'{raw}' is missing a recipe name"
        )));
    }
    if name.starts_with('/') || name.ends_with('/') || name.contains("//") {
        return Err(LifecycleError::InvalidArgument(format!(
            "'{raw}' is not a valid recipe path"
        )));
    }
    if name
        .split('/')
        .any(|segment| segment == "." || segment == "..")
    {
        return Err(LifecycleError::InvalidArgument(format!(
            "'{raw}' must not contain relative path segments"
        )));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(LifecycleError::InvalidArgument(format!(
            "'{raw}' must not contain whitespace"
        )));
    }
    Ok(())
}
