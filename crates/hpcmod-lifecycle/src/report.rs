use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use hpcmod_core::{lifecycle_error, LifecycleError, SoftwareName};
use serde::Serialize;

use crate::reinstall::ReinstallReport;
use crate::upgrade::UpgradeOutcome;

/// Result of one unit of a batch run.
#[derive(Debug)]
pub struct BatchEntry<T> {
    pub name: SoftwareName,
    pub result: Result<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub lines: Vec<String>,
    pub succeeded: u32,
    pub available: u32,
    pub up_to_date: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// What a dry-run upgrade found, keyed by software name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DryRunReport {
    /// Latest tag for every software with an upgrade available.
    pub available: BTreeMap<String, String>,
    pub up_to_date: usize,
    /// Reason code for software that could not be checked.
    pub skipped: BTreeMap<String, String>,
    pub failed: BTreeMap<String, String>,
}

impl DryRunReport {
    pub fn from_entries(entries: &[BatchEntry<UpgradeOutcome>]) -> Self {
        let mut report = Self::default();
        for entry in entries {
            let name = entry.name.to_string();
            match &entry.result {
                Ok(UpgradeOutcome::Available { latest, .. }) => {
                    report.available.insert(name, latest.clone());
                }
                Ok(UpgradeOutcome::UpToDate { .. }) => report.up_to_date += 1,
                Ok(UpgradeOutcome::Upgraded(summary)) => {
                    report.available.insert(name, summary.latest.clone());
                }
                Err(err) if is_skip(err) => {
                    report.skipped.insert(name, reason_code(err).to_string());
                }
                Err(err) => {
                    report.failed.insert(name, reason_code(err).to_string());
                }
            }
        }
        report
    }
}

pub fn build_upgrade_report(entries: &[BatchEntry<UpgradeOutcome>]) -> BatchReport {
    let mut report = BatchReport {
        lines: Vec::with_capacity(entries.len()),
        ..BatchReport::default()
    };

    for entry in entries {
        let name = &entry.name;
        match &entry.result {
            Ok(UpgradeOutcome::Upgraded(summary)) => {
                report.succeeded += 1;
                report
                    .lines
                    .push(format!("{name}: upgraded to {}", summary.latest));
            }
            Ok(UpgradeOutcome::Available { latest, .. }) => {
                report.available += 1;
                report.lines.push(format!("{name}: {latest} available"));
            }
            Ok(UpgradeOutcome::UpToDate { .. }) => {
                report.up_to_date += 1;
                report.lines.push(format!("{name}: up-to-date"));
            }
            Err(err) if is_skip(err) => {
                report.skipped += 1;
                report
                    .lines
                    .push(format!("{name}: skipped (reason={})", reason_code(err)));
            }
            Err(err) => {
                report.failed += 1;
                report
                    .lines
                    .push(format!("{name}: failed (reason={})", reason_code(err)));
            }
        }
    }
    report
}

pub fn build_reinstall_report(entries: &[BatchEntry<ReinstallReport>]) -> BatchReport {
    let mut report = BatchReport::default();
    for entry in entries {
        let reinstall = match &entry.result {
            Ok(reinstall) => reinstall,
            Err(err) => {
                report.failed += 1;
                report.lines.push(format!(
                    "{}: failed (reason={})",
                    entry.name,
                    reason_code(err)
                ));
                continue;
            }
        };
        for outcome in &reinstall.tags {
            let qualified = reinstall.name.with_tag(&outcome.tag);
            match &outcome.result {
                Ok(_) => {
                    report.succeeded += 1;
                    report.lines.push(format!("{qualified}: reinstalled"));
                }
                Err(err) => {
                    report.failed += 1;
                    report
                        .lines
                        .push(format!("{qualified}: failed (reason={})", reason_code(err)));
                }
            }
        }
    }
    report
}

pub fn format_upgrade_summary_line(report: &BatchReport) -> String {
    format!(
        "upgrade summary: upgraded={} available={} up-to-date={} skipped={} failed={}",
        report.succeeded, report.available, report.up_to_date, report.skipped, report.failed
    )
}

pub fn format_reinstall_summary_line(report: &BatchReport) -> String {
    format!(
        "reinstall summary: reinstalled={} failed={}",
        report.succeeded, report.failed
    )
}

pub fn ensure_batch_succeeded(operation: &str, failed: u32) -> Result<()> {
    if failed > 0 {
        return Err(anyhow!("{operation} failed for {failed} item(s)"));
    }
    Ok(())
}

/// Not installed or nothing to upgrade to: the unit is skipped, not failed.
fn is_skip(err: &anyhow::Error) -> bool {
    matches!(
        lifecycle_error(err),
        Some(LifecycleError::NotInstalled { .. } | LifecycleError::NoLatestVersion { .. })
    )
}

fn reason_code(err: &anyhow::Error) -> &'static str {
    lifecycle_error(err)
        .map(LifecycleError::reason_code)
        .unwrap_or("error")
}
