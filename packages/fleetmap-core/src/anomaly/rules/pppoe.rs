use std::collections::HashSet;

use crate::anomaly::{AnomalyRule, RuleContext};
use crate::model::{Anomaly, AnomalyKind, Snapshot};

/// Too many enabled PPPoE accounts without a live session.
pub struct ExcessInactivePppoeRule;

impl AnomalyRule for ExcessInactivePppoeRule {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::ExcessInactivePppoe
    }

    fn evaluate(&self, snapshot: &Snapshot, context: &RuleContext<'_>) -> Vec<Anomaly> {
        let active: HashSet<&str> = snapshot
            .pppoe_sessions
            .iter()
            .map(|s| s.username.as_str())
            .collect();
        let enabled: Vec<&str> = snapshot
            .pppoe_credentials
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.username.as_str())
            .collect();
        if enabled.is_empty() {
            return Vec::new();
        }

        let inactive = enabled.iter().filter(|u| !active.contains(*u)).count();
        let ratio = inactive as f64 / enabled.len() as f64;
        if ratio <= context.thresholds.max_inactive_pppoe_ratio {
            return Vec::new();
        }

        vec![Anomaly::new(
            &snapshot.identity,
            self.kind(),
            format!(
                "{} of {} enabled PPPoE accounts have no active session ({:.0}%)",
                inactive,
                enabled.len(),
                ratio * 100.0
            ),
        )
        .with_suggestion("Disable or remove accounts that are no longer in use")]
    }
}
