use anyhow::{anyhow, Context, Result};
use hpcmod_core::{ContainerTech, InstalledIndex, ModuleSystem};
use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::{ModuleLayout, RECEIPT_FILE_NAME};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReceipt {
    pub name: String,
    pub tag: String,
    pub module_sys: ModuleSystem,
    pub container_tech: ContainerTech,
    /// Image file path for singularity, image reference otherwise.
    pub container: String,
    pub container_sha256: Option<String>,
    /// Whether the container file is owned by this installation and may be removed.
    pub container_managed: bool,
    pub wrappers: Vec<String>,
    pub installed_at_unix_nanos: u128,
}

pub fn write_module_receipt(layout: &ModuleLayout, receipt: &ModuleReceipt) -> Result<PathBuf> {
    let mut payload = String::new();
    payload.push_str(&format!("name={}\n", receipt.name));
    payload.push_str(&format!("tag={}\n", receipt.tag));
    payload.push_str(&format!("module_sys={}\n", receipt.module_sys.as_str()));
    payload.push_str(&format!(
        "container_tech={}\n",
        receipt.container_tech.as_str()
    ));
    payload.push_str(&format!("container={}\n", receipt.container));
    if let Some(sha256) = &receipt.container_sha256 {
        payload.push_str(&format!("container_sha256={}\n", sha256));
    }
    payload.push_str(&format!(
        "container_managed={}\n",
        receipt.container_managed
    ));
    for wrapper in &receipt.wrappers {
        payload.push_str(&format!("wrapper={}\n", wrapper));
    }
    payload.push_str(&format!(
        "installed_at_unix_nanos={}\n",
        receipt.installed_at_unix_nanos
    ));

    let path = layout.receipt_path(&receipt.name, &receipt.tag);
    fs::write(&path, payload.as_bytes())
        .with_context(|| format!("failed to write install receipt: {}", path.display()))?;
    Ok(path)
}

pub fn read_module_receipt(
    layout: &ModuleLayout,
    name: &str,
    tag: &str,
) -> Result<Option<ModuleReceipt>> {
    let path = layout.receipt_path(name, tag);
    if !path.is_file() {
        return Ok(None);
    }
    read_receipt_file(&path).map(Some)
}

/// Every receipt under the module root, sorted by name then install time.
pub fn read_module_receipts(layout: &ModuleLayout) -> Result<Vec<ModuleReceipt>> {
    let root = layout.module_base();
    let mut receipts = Vec::new();
    if root.is_dir() {
        collect_receipts(root, &mut receipts)?;
    }
    receipts.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(a.installed_at_unix_nanos.cmp(&b.installed_at_unix_nanos))
            .then(a.tag.cmp(&b.tag))
    });
    Ok(receipts)
}

pub fn read_installed_index(layout: &ModuleLayout) -> Result<InstalledIndex> {
    let mut index = InstalledIndex::new();
    for receipt in read_module_receipts(layout)? {
        index.insert(receipt.name, receipt.tag);
    }
    Ok(index)
}

fn collect_receipts(dir: &Path, receipts: &mut Vec<ModuleReceipt>) -> Result<()> {
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read module directory: {}", dir.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            collect_receipts(&path, receipts)?;
            continue;
        }
        if !file_type.is_file()
            || path.file_name().and_then(|v| v.to_str()) != Some(RECEIPT_FILE_NAME)
        {
            continue;
        }
        receipts.push(read_receipt_file(&path)?);
    }
    Ok(())
}

fn read_receipt_file(path: &Path) -> Result<ModuleReceipt> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read install receipt: {}", path.display()))?;
    parse_receipt(&raw)
        .with_context(|| format!("failed to parse install receipt: {}", path.display()))
}

pub(crate) fn parse_receipt(raw: &str) -> Result<ModuleReceipt> {
    let mut name = None;
    let mut tag = None;
    let mut module_sys = None;
    let mut container_tech = None;
    let mut container = None;
    let mut container_sha256 = None;
    let mut container_managed = None;
    let mut wrappers = Vec::new();
    let mut installed_at_unix_nanos = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        match k {
            "name" => name = Some(v.to_string()),
            "tag" => tag = Some(v.to_string()),
            "module_sys" => module_sys = Some(ModuleSystem::parse(v)?),
            "container_tech" => container_tech = Some(ContainerTech::parse(v)?),
            "container" => container = Some(v.to_string()),
            "container_sha256" => container_sha256 = Some(v.to_string()),
            "container_managed" => {
                container_managed = Some(
                    v.parse()
                        .map_err(|_| anyhow!("container_managed must be true or false"))?,
                )
            }
            "wrapper" => wrappers.push(v.to_string()),
            "installed_at_unix_nanos" => {
                installed_at_unix_nanos =
                    Some(v.parse().context("installed_at_unix_nanos must be u128")?)
            }
            _ => {}
        }
    }

    Ok(ModuleReceipt {
        name: name.context("missing name")?,
        tag: tag.context("missing tag")?,
        module_sys: module_sys.unwrap_or_default(),
        container_tech: container_tech.unwrap_or_default(),
        container: container.context("missing container")?,
        container_sha256,
        container_managed: container_managed.unwrap_or(true),
        wrappers,
        installed_at_unix_nanos: installed_at_unix_nanos
            .context("missing installed_at_unix_nanos")?,
    })
}
