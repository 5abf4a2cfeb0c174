use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModuleSystem {
    #[default]
    Lmod,
    Tcl,
}

impl ModuleSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lmod => "lmod",
            Self::Tcl => "tcl",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "lmod" => Ok(Self::Lmod),
            "tcl" => Ok(Self::Tcl),
            _ => Err(anyhow!("invalid module system: {value}")),
        }
    }

    pub fn module_file_name(&self) -> &'static str {
        match self {
            Self::Lmod => "module.lua",
            Self::Tcl => "module.tcl",
        }
    }

    /// File name of a module's entry inside a view directory.
    pub fn view_link_name(&self, tag: &str) -> String {
        match self {
            Self::Lmod => format!("{tag}.lua"),
            Self::Tcl => tag.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerTech {
    #[default]
    Singularity,
    Podman,
    Docker,
}

impl ContainerTech {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Singularity => "singularity",
            Self::Podman => "podman",
            Self::Docker => "docker",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "singularity" => Ok(Self::Singularity),
            "podman" => Ok(Self::Podman),
            "docker" => Ok(Self::Docker),
            _ => Err(anyhow!("invalid container tech: {value}")),
        }
    }

    /// Whether pulls land as a file under the container root.
    pub fn stores_image_file(&self) -> bool {
        matches!(self, Self::Singularity)
    }
}
