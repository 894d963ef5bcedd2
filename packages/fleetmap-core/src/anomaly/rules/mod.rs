//! Built-in anomaly rules.

mod addressing;
mod interfaces;
mod neighbors;
mod pppoe;
mod system;

pub use addressing::{DisabledInterfaceWithAddressRule, MultipleAddressesRule};
pub use interfaces::UncommentedInterfaceRule;
pub use neighbors::UnknownNeighborRule;
pub use pppoe::ExcessInactivePppoeRule;
pub use system::{OutdatedFirmwareRule, ResourcePressureRule};

use super::AnomalyRule;

/// Every built-in rule, one per [`AnomalyKind`](crate::model::AnomalyKind).
pub fn registry() -> Vec<Box<dyn AnomalyRule>> {
    vec![
        Box::new(MultipleAddressesRule),
        Box::new(DisabledInterfaceWithAddressRule),
        Box::new(UnknownNeighborRule),
        Box::new(ExcessInactivePppoeRule),
        Box::new(UncommentedInterfaceRule),
        Box::new(OutdatedFirmwareRule),
        Box::new(ResourcePressureRule),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnomalyKind;

    #[test]
    fn test_registry_covers_every_kind_once() {
        let kinds: Vec<AnomalyKind> = registry().iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, AnomalyKind::ALL.to_vec());
    }
}
