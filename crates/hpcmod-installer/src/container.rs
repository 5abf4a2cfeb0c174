use anyhow::{anyhow, Context, Result};
use hpcmod_core::ContainerTech;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

/// Acquires and discards container images.
///
/// `source` is a scheme-qualified reference such as `docker://quay.io/org/tool:1.0`
/// or `oras://ghcr.io/org/tool:1.0`. File-backed techs write the image to
/// `destination`; the others keep it in their own store.
pub trait ContainerPuller {
    fn pull(&self, tech: ContainerTech, source: &str, destination: &Path) -> Result<()>;

    fn remove_image(&self, tech: ContainerTech, image: &str) -> Result<()>;

    /// Whether a store-backed runtime already holds `image`. Always false for
    /// file-backed techs.
    fn has_image(&self, tech: ContainerTech, image: &str) -> Result<bool>;
}

/// Shells out to the container runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandPuller;

impl ContainerPuller for CommandPuller {
    fn pull(&self, tech: ContainerTech, source: &str, destination: &Path) -> Result<()> {
        let mut command = build_pull_command(tech, source, destination);
        tracing::info!(tech = tech.as_str(), source, "pulling container");
        run_command(&mut command, &format!("failed to pull {source}"))
    }

    fn remove_image(&self, tech: ContainerTech, image: &str) -> Result<()> {
        if tech.stores_image_file() {
            return Ok(());
        }
        let mut command = Command::new(tech.as_str());
        command.arg("rmi").arg(image);
        run_command(&mut command, &format!("failed to remove image {image}"))
    }

    fn has_image(&self, tech: ContainerTech, image: &str) -> Result<bool> {
        if tech.stores_image_file() {
            return Ok(false);
        }
        let output = build_inspect_command(tech, image)
            .output()
            .with_context(|| format!("failed to inspect image {image}: command failed to start"))?;
        Ok(output.status.success())
    }
}

pub(crate) fn build_inspect_command(tech: ContainerTech, image: &str) -> Command {
    let mut command = Command::new(tech.as_str());
    command.arg("image").arg("inspect").arg(image);
    command
}

pub(crate) fn build_pull_command(
    tech: ContainerTech,
    source: &str,
    destination: &Path,
) -> Command {
    match tech {
        ContainerTech::Singularity => {
            let mut command = Command::new("singularity");
            command.arg("pull").arg("--force").arg(destination).arg(source);
            command
        }
        ContainerTech::Podman | ContainerTech::Docker => {
            let mut command = Command::new(tech.as_str());
            command.arg("pull").arg(strip_scheme(source));
            command
        }
    }
}

/// Image reference a runtime with its own store addresses the image by.
pub fn strip_scheme(source: &str) -> &str {
    source
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(source)
}

pub(crate) fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("failed to open container: {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to hash container: {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}
