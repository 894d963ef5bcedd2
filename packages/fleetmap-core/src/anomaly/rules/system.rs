use std::cmp::Ordering;

use crate::anomaly::{compare_versions, AnomalyRule, RuleContext};
use crate::model::{Anomaly, AnomalyKind, Snapshot};

/// Firmware older than the configured minimum.
pub struct OutdatedFirmwareRule;

impl AnomalyRule for OutdatedFirmwareRule {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::OutdatedFirmware
    }

    fn evaluate(&self, snapshot: &Snapshot, context: &RuleContext<'_>) -> Vec<Anomaly> {
        let Some(resource) = &snapshot.resource else {
            return Vec::new();
        };
        let minimum = &context.thresholds.min_firmware_version;

        match compare_versions(&resource.version, minimum) {
            Some(Ordering::Less) => vec![Anomaly::new(
                &snapshot.identity,
                self.kind(),
                format!("firmware {} is older than {}", resource.version, minimum),
            )
            .with_suggestion("Upgrade RouterOS")],
            _ => Vec::new(),
        }
    }
}

/// CPU or memory usage above the configured ceiling.
pub struct ResourcePressureRule;

impl AnomalyRule for ResourcePressureRule {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::ResourcePressure
    }

    fn evaluate(&self, snapshot: &Snapshot, context: &RuleContext<'_>) -> Vec<Anomaly> {
        let Some(resource) = &snapshot.resource else {
            return Vec::new();
        };
        let thresholds = context.thresholds;
        let mut reasons = Vec::new();

        if let Some(cpu) = resource.cpu_load {
            if f64::from(cpu) > thresholds.max_cpu_load {
                reasons.push(format!("CPU load {}%", cpu));
            }
        }
        if let Some(memory) = resource.memory_usage_percent() {
            if memory > thresholds.max_memory_usage {
                reasons.push(format!("memory usage {:.1}%", memory));
            }
        }

        if reasons.is_empty() {
            return Vec::new();
        }
        vec![Anomaly::new(&snapshot.identity, self.kind(), reasons.join(", "))
            .with_suggestion("Check for runaway services or undersized hardware")]
    }
}
