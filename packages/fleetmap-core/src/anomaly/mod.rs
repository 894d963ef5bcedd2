//! Anomaly detection over a batch of snapshots.
//!
//! Each check is an independent [`AnomalyRule`]. The detector evaluates the
//! enabled rules against every device and collects what they report; rules
//! never see each other's output and never touch the snapshots.

pub mod rules;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

use crate::model::{Anomaly, AnomalyKind, NeighborRecord, Snapshot};
use crate::topology::DeviceIndex;

/// A single configuration check.
pub trait AnomalyRule: Send + Sync {
    /// The kind reported; its severity is fixed by the kind.
    fn kind(&self) -> AnomalyKind;

    /// Anomalies found on one device. Must not depend on evaluation order.
    fn evaluate(&self, snapshot: &Snapshot, context: &RuleContext<'_>) -> Vec<Anomaly>;
}

/// Read-only state shared by every rule during one detection pass.
pub struct RuleContext<'a> {
    pub thresholds: &'a Thresholds,
    index: DeviceIndex<'a>,
}

impl<'a> RuleContext<'a> {
    pub fn new(snapshots: &'a [Snapshot], thresholds: &'a Thresholds) -> Self {
        Self {
            thresholds,
            index: DeviceIndex::new(snapshots),
        }
    }

    /// Whether a neighbor record refers to a device collected in this run.
    pub fn is_known(&self, neighbor: &NeighborRecord) -> bool {
        self.index.resolve(neighbor).is_some()
    }

    pub fn devices(&self) -> &[&'a Snapshot] {
        self.index.devices()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// CPU load percentage above which a device is under pressure
    pub max_cpu_load: f64,
    /// Memory usage percentage above which a device is under pressure
    pub max_memory_usage: f64,
    /// Oldest acceptable firmware, compared component by component
    pub min_firmware_version: String,
    /// Share of enabled PPPoE accounts allowed to be without a session
    pub max_inactive_pppoe_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_cpu_load: 90.0,
            max_memory_usage: 90.0,
            min_firmware_version: "6.0".to_string(),
            max_inactive_pppoe_ratio: 0.5,
        }
    }
}

/// Per-rule switches. Every rule is on by default except `unknown_neighbor`,
/// which fires on any partial inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleToggles {
    pub multiple_addresses: bool,
    pub disabled_interface_with_address: bool,
    pub unknown_neighbor: bool,
    pub excess_inactive_pppoe: bool,
    pub uncommented_interface: bool,
    pub outdated_firmware: bool,
    pub resource_pressure: bool,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self {
            multiple_addresses: true,
            disabled_interface_with_address: true,
            unknown_neighbor: false,
            excess_inactive_pppoe: true,
            uncommented_interface: true,
            outdated_firmware: true,
            resource_pressure: true,
        }
    }
}

impl RuleToggles {
    pub fn is_enabled(&self, kind: AnomalyKind) -> bool {
        match kind {
            AnomalyKind::MultipleAddresses => self.multiple_addresses,
            AnomalyKind::DisabledInterfaceWithAddress => self.disabled_interface_with_address,
            AnomalyKind::UnknownNeighbor => self.unknown_neighbor,
            AnomalyKind::ExcessInactivePppoe => self.excess_inactive_pppoe,
            AnomalyKind::UncommentedInterface => self.uncommented_interface,
            AnomalyKind::OutdatedFirmware => self.outdated_firmware,
            AnomalyKind::ResourcePressure => self.resource_pressure,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyOptions {
    pub enabled: bool,
    pub rules: RuleToggles,
    pub thresholds: Thresholds,
}

impl Default for AnomalyOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: RuleToggles::default(),
            thresholds: Thresholds::default(),
        }
    }
}

/// Evaluate every enabled rule against every device.
pub fn detect(snapshots: &[Snapshot], options: &AnomalyOptions) -> Vec<Anomaly> {
    if !options.enabled {
        return Vec::new();
    }

    let context = RuleContext::new(snapshots, &options.thresholds);
    let active: Vec<Box<dyn AnomalyRule>> = rules::registry()
        .into_iter()
        .filter(|rule| options.rules.is_enabled(rule.kind()))
        .collect();

    let mut anomalies = Vec::new();
    for snapshot in context.devices() {
        for rule in &active {
            anomalies.extend(
                rule.evaluate(snapshot, &context)
                    .into_iter()
                    .map(|anomaly| anchor_interface(snapshot, anomaly)),
            );
        }
    }
    anomalies.sort_by(compare);

    info!(
        "Detected {} anomaly(ies) with {} rule(s) across {} device(s)",
        anomalies.len(),
        active.len(),
        context.devices().len()
    );
    anomalies
}

/// An anomaly may only name an interface its device actually reported.
fn anchor_interface(snapshot: &Snapshot, mut anomaly: Anomaly) -> Anomaly {
    if let Some(name) = anomaly.interface.take() {
        if snapshot.has_interface(&name) {
            anomaly.interface = Some(name);
        } else {
            anomaly.description = format!("{} (interface {})", anomaly.description, name);
        }
    }
    anomaly
}

fn compare(a: &Anomaly, b: &Anomaly) -> Ordering {
    (&a.device, a.kind, &a.interface, &a.description)
        .cmp(&(&b.device, b.kind, &b.interface, &b.description))
}

/// Compare dotted firmware versions numerically, component by component.
///
/// Only the leading token is considered (`"6.49.10 (long-term)"` is 6.49.10)
/// and missing components count as zero. Returns `None` if either side has
/// no leading number.
pub fn compare_versions(version: &str, other: &str) -> Option<Ordering> {
    let left = parse_version(version)?;
    let right = parse_version(other)?;
    let len = left.len().max(right.len());
    let component = |v: &[u64], i: usize| v.get(i).copied().unwrap_or(0);
    Some(
        (0..len)
            .map(|i| component(&left, i).cmp(&component(&right, i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal),
    )
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    let token = version.split_whitespace().next()?;
    let mut parts = Vec::new();
    for piece in token.split('.') {
        let digits: String = piece.chars().take_while(char::is_ascii_digit).collect();
        match digits.parse::<u64>() {
            Ok(n) => parts.push(n),
            Err(_) => break,
        }
        // "12rc1" keeps 12 and stops there
        if digits.len() != piece.len() {
            break;
        }
    }
    if parts.is_empty() { None } else { Some(parts) }
}
