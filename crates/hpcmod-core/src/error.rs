use thiserror::Error;

/// User-visible lifecycle failures. Carried inside `anyhow::Error` and recovered
/// with `downcast_ref` wherever a caller needs to tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("you currently do not have '{name}' installed; install it with: hpcmod install {name}")]
    NotInstalled { name: String },

    #[error("'{name}' is not known in any configured registry; check the name or try a different recipe")]
    NotFound { name: String },

    #[error("no latest version found for '{name}'")]
    NoLatestVersion { name: String },

    #[error("{0}")]
    InvalidArgument(String),
}

impl LifecycleError {
    pub fn not_installed(name: impl Into<String>) -> Self {
        Self::NotInstalled { name: name.into() }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Short kebab-case code used in batch summaries.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NotInstalled { .. } => "not-installed",
            Self::NotFound { .. } => "not-found",
            Self::NoLatestVersion { .. } => "no-latest-version",
            Self::InvalidArgument(_) => "invalid-argument",
        }
    }
}

/// Finds a [`LifecycleError`] anywhere in an error chain.
pub fn lifecycle_error(err: &anyhow::Error) -> Option<&LifecycleError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<LifecycleError>())
}
