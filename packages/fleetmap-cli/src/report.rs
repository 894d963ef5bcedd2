//! Inventory rendering: text summary for the terminal, JSON report on disk

use anyhow::{Context, Result};
use fleetmap_core::{CollectionResult, Inventory};
use std::fmt::Write as _;
use std::path::Path;

/// Write the inventory as pretty JSON, replacing any previous report
pub fn write_report(path: &Path, inventory: &Inventory) -> Result<()> {
    let content = serde_json::to_string_pretty(inventory).context("Failed to serialize inventory")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    // Write next to the target then rename, so readers never see half a report
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;

    tracing::debug!("Saved report: {} results", inventory.results.len());
    Ok(())
}

pub fn print_summary(inventory: &Inventory) {
    print!("{}", render_summary(inventory));
}

pub fn render_summary(inventory: &Inventory) -> String {
    let stats = &inventory.stats;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Collected {}/{} devices at {}",
        stats.collected_devices,
        stats.total_devices,
        inventory.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "{:<20} {:<16} {:<10} {:<6} DETAILS", "DEVICE", "ADDRESS", "VERSION", "TRIES");
    let _ = writeln!(out, "{}", "-".repeat(72));
    for result in &inventory.results {
        match result {
            CollectionResult::Success { snapshot, attempts } => {
                let version = snapshot
                    .resource
                    .as_ref()
                    .map(|r| r.version.as_str())
                    .filter(|v| !v.is_empty())
                    .unwrap_or("-");
                let mut details = format!(
                    "{} interfaces, {} neighbors",
                    snapshot.interfaces.len(),
                    snapshot.neighbors.len()
                );
                if !snapshot.category_errors.is_empty() {
                    let _ = write!(details, ", {} category error(s)", snapshot.category_errors.len());
                }
                if snapshot.dropped_records > 0 {
                    let _ = write!(details, ", {} dropped", snapshot.dropped_records);
                }
                let _ = writeln!(
                    out,
                    "{:<20} {:<16} {:<10} {:<6} {}",
                    snapshot.identity, snapshot.management_address, version, attempts, details
                );
            }
            CollectionResult::Failure { target, error, attempts } => {
                let _ = writeln!(
                    out,
                    "{:<20} {:<16} {:<10} {:<6} FAILED: {}",
                    target.label(),
                    target.address,
                    "-",
                    attempts,
                    error
                );
            }
        }
    }

    if !inventory.links.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Links ({} backbone, {} ptp, {} ptmp, {} pppoe):",
            stats.backbone_links, stats.ptp_links, stats.ptmp_links, stats.pppoe_links
        );
        for link in &inventory.links {
            let _ = writeln!(
                out,
                "  {} <-> {}  [{}, {:.2}]",
                link.a, link.b, link.link_type, link.confidence
            );
        }
    }

    if !inventory.anomalies.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Anomalies ({} critical, {} warning, {} info):",
            stats.critical_anomalies, stats.warning_anomalies, stats.info_anomalies
        );
        for anomaly in &inventory.anomalies {
            let location = match &anomaly.interface {
                Some(interface) => format!("{} {}", anomaly.device, interface),
                None => anomaly.device.clone(),
            };
            let _ = writeln!(
                out,
                "  [{}] {}: {} ({})",
                anomaly.severity, location, anomaly.description, anomaly.kind
            );
            if let Some(suggestion) = &anomaly.suggestion {
                let _ = writeln!(out, "      -> {}", suggestion);
            }
        }
    }

    out
}
