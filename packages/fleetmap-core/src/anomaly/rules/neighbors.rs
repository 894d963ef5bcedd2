use crate::anomaly::{AnomalyRule, RuleContext};
use crate::model::{Anomaly, AnomalyKind, Snapshot};
use crate::oui;

/// A neighbor that matches no device collected in this run.
pub struct UnknownNeighborRule;

impl AnomalyRule for UnknownNeighborRule {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::UnknownNeighbor
    }

    fn evaluate(&self, snapshot: &Snapshot, context: &RuleContext<'_>) -> Vec<Anomaly> {
        snapshot
            .neighbors
            .iter()
            .filter(|neighbor| !context.is_known(neighbor))
            .map(|neighbor| {
                let name = match (neighbor.identity.as_str(), neighbor.address) {
                    ("", Some(ip)) => ip.to_string(),
                    (identity, _) => identity.to_string(),
                };
                let mut description =
                    format!("neighbor {} on {} is not in the inventory", name, neighbor.interface);
                if let Some(family) = neighbor.vendor.as_deref().and_then(oui::vendor_family) {
                    description.push_str(&format!(" ({} equipment)", family));
                }
                Anomaly::new(&snapshot.identity, self.kind(), description)
                    .on_interface(&neighbor.interface)
                    .with_suggestion("Add the device to the target list if it is managed")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::Thresholds;
    use crate::model::{Interface, InterfaceKind, NeighborRecord};

    #[test]
    fn test_unknown_neighbor() {
        let mut r1 = Snapshot::new("R1", "10.0.0.1");
        r1.interfaces.push(Interface::new("ether1", InterfaceKind::Ethernet));
        r1.neighbors.push(NeighborRecord::new("ether1", "R2"));
        let mut stranger = NeighborRecord::new("ether1", "");
        stranger.address = Some("192.0.2.7".parse().unwrap());
        stranger.vendor = Some("Ubiquiti Inc".to_string());
        r1.neighbors.push(stranger);
        let r2 = Snapshot::new("R2", "10.0.0.2");
        let snaps = [r1, r2];
        let thresholds = Thresholds::default();
        let context = RuleContext::new(&snaps, &thresholds);

        let found = UnknownNeighborRule.evaluate(&snaps[0], &context);
        assert_eq!(found.len(), 1);
        assert!(found[0].description.contains("192.0.2.7"));
        assert!(found[0].description.contains("ubiquiti"));
    }
}
