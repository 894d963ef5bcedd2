use std::collections::BTreeMap;

use crate::anomaly::{AnomalyRule, RuleContext};
use crate::model::{Address, Anomaly, AnomalyKind, Snapshot};

/// Enabled addresses grouped by the interface they are configured on.
fn enabled_by_interface(snapshot: &Snapshot) -> BTreeMap<&str, Vec<&Address>> {
    let mut grouped: BTreeMap<&str, Vec<&Address>> = BTreeMap::new();
    for address in snapshot.addresses.iter().filter(|a| a.enabled) {
        grouped.entry(address.interface.as_str()).or_default().push(address);
    }
    grouped
}

fn list(addresses: &[&Address]) -> String {
    addresses
        .iter()
        .map(|a| a.cidr.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// More than one enabled address on the same interface.
pub struct MultipleAddressesRule;

impl AnomalyRule for MultipleAddressesRule {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::MultipleAddresses
    }

    fn evaluate(&self, snapshot: &Snapshot, _context: &RuleContext<'_>) -> Vec<Anomaly> {
        enabled_by_interface(snapshot)
            .into_iter()
            .filter(|(_, addresses)| addresses.len() > 1)
            .map(|(interface, addresses)| {
                Anomaly::new(
                    &snapshot.identity,
                    self.kind(),
                    format!(
                        "{} addresses on {}: {}",
                        addresses.len(),
                        interface,
                        list(&addresses)
                    ),
                )
                .on_interface(interface)
                .with_suggestion("Confirm the secondary addresses are intentional")
            })
            .collect()
    }
}

/// A disabled interface still carrying enabled addresses.
pub struct DisabledInterfaceWithAddressRule;

impl AnomalyRule for DisabledInterfaceWithAddressRule {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::DisabledInterfaceWithAddress
    }

    fn evaluate(&self, snapshot: &Snapshot, _context: &RuleContext<'_>) -> Vec<Anomaly> {
        let grouped = enabled_by_interface(snapshot);
        snapshot
            .interfaces
            .iter()
            .filter(|iface| !iface.enabled)
            .filter_map(|iface| {
                let addresses = grouped.get(iface.name.as_str())?;
                Some(
                    Anomaly::new(
                        &snapshot.identity,
                        self.kind(),
                        format!(
                            "disabled interface {} has {}",
                            iface.name,
                            list(addresses)
                        ),
                    )
                    .on_interface(&iface.name)
                    .with_suggestion("Remove the address or re-enable the interface"),
                )
            })
            .collect()
    }
}
