use crate::anomaly::{AnomalyRule, RuleContext};
use crate::model::{Anomaly, AnomalyKind, Snapshot};

/// An enabled interface without a description.
pub struct UncommentedInterfaceRule;

impl AnomalyRule for UncommentedInterfaceRule {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::UncommentedInterface
    }

    fn evaluate(&self, snapshot: &Snapshot, _context: &RuleContext<'_>) -> Vec<Anomaly> {
        snapshot
            .interfaces
            .iter()
            .filter(|iface| iface.enabled && !iface.has_comment())
            .map(|iface| {
                Anomaly::new(
                    &snapshot.identity,
                    self.kind(),
                    format!("interface {} has no comment", iface.name),
                )
                .on_interface(&iface.name)
                .with_suggestion("Describe what the interface connects to")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::Thresholds;
    use crate::model::{Interface, InterfaceKind};

    #[test]
    fn test_only_enabled_uncommented_interfaces() {
        let mut snap = Snapshot::new("R1", "10.0.0.1");
        let mut commented = Interface::new("ether1", InterfaceKind::Ethernet);
        commented.comment = Some("to R2".to_string());
        let mut disabled = Interface::new("ether3", InterfaceKind::Ethernet);
        disabled.enabled = false;
        snap.interfaces = vec![
            commented,
            Interface::new("ether2", InterfaceKind::Ethernet),
            disabled,
        ];
        let snaps = [snap];
        let thresholds = Thresholds::default();
        let context = RuleContext::new(&snaps, &thresholds);

        let found = UncommentedInterfaceRule.evaluate(&snaps[0], &context);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].interface.as_deref(), Some("ether2"));
    }
}
