//! Inventory assembly: collection results in, analyzed inventory out.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::anomaly::{self, AnomalyOptions};
use crate::collector;
use crate::config::Config;
use crate::model::{
    Anomaly, CollectionResult, Inventory, InventoryStats, Link, LinkType, Severity, Snapshot,
};
use crate::session::DeviceConnector;
use crate::topology::{self, TopologyOptions};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Master switch; when off neither links nor anomalies are computed
    pub enabled: bool,
    pub topology: TopologyOptions,
    pub anomalies: AnomalyOptions,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            topology: TopologyOptions::default(),
            anomalies: AnomalyOptions::default(),
        }
    }
}

/// Analyze the successful snapshots and wrap everything into an [`Inventory`].
///
/// Link inference and anomaly detection read the same snapshots and run
/// side by side.
pub fn build_inventory(results: Vec<CollectionResult>, options: &AnalysisOptions) -> Inventory {
    let snapshots: Vec<Snapshot> = results
        .iter()
        .filter_map(|r| r.snapshot().cloned())
        .collect();

    let (links, anomalies) = if options.enabled {
        std::thread::scope(|scope| {
            let links = scope.spawn(|| topology::infer(&snapshots, &options.topology));
            let anomalies = anomaly::detect(&snapshots, &options.anomalies);
            let links = links.join().unwrap_or_else(|_| {
                warn!("Topology inference panicked; reporting no links");
                Vec::new()
            });
            (links, anomalies)
        })
    } else {
        info!("Analysis disabled; reporting collection results only");
        (Vec::new(), Vec::new())
    };

    let stats = compute_stats(&results, &links, &anomalies);
    Inventory {
        generated_at: Utc::now(),
        results,
        links,
        anomalies,
        stats,
    }
}

fn compute_stats(results: &[CollectionResult], links: &[Link], anomalies: &[Anomaly]) -> InventoryStats {
    let snapshots: Vec<&Snapshot> = results.iter().filter_map(CollectionResult::snapshot).collect();
    let links_of = |t: LinkType| links.iter().filter(|l| l.link_type == t).count();
    let anomalies_of = |s: Severity| anomalies.iter().filter(|a| a.severity == s).count();

    InventoryStats {
        total_devices: results.len(),
        collected_devices: snapshots.len(),
        failed_devices: results.len() - snapshots.len(),
        total_interfaces: snapshots.iter().map(|s| s.interfaces.len()).sum(),
        total_neighbors: snapshots.iter().map(|s| s.neighbors.len()).sum(),
        total_links: links.len(),
        backbone_links: links_of(LinkType::Backbone),
        ptp_links: links_of(LinkType::PointToPoint),
        ptmp_links: links_of(LinkType::PointToMultipoint),
        pppoe_links: links_of(LinkType::Pppoe),
        total_anomalies: anomalies.len(),
        critical_anomalies: anomalies_of(Severity::Critical),
        warning_anomalies: anomalies_of(Severity::Warning),
        info_anomalies: anomalies_of(Severity::Info),
    }
}

/// Collect from every configured target and build the inventory.
pub async fn run(connector: Arc<dyn DeviceConnector>, config: &Config) -> anyhow::Result<Inventory> {
    config.validate()?;
    let targets = config.targets();

    let results = collector::collect(connector, &targets, &config.collect_options()).await;
    let inventory = build_inventory(results, &config.analysis_options());

    info!(
        "Inventory ready: {}/{} device(s), {} link(s), {} anomaly(ies)",
        inventory.stats.collected_devices,
        inventory.stats.total_devices,
        inventory.stats.total_links,
        inventory.stats.total_anomalies
    );
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionError;
    use crate::model::{Interface, InterfaceKind, NeighborRecord, PppoeCredential, Target};
    use crate::session::ReplayConnector;

    fn success(snapshot: Snapshot) -> CollectionResult {
        CollectionResult::Success {
            snapshot,
            attempts: 1,
        }
    }

    fn linked_pair() -> Vec<CollectionResult> {
        let mut r1 = Snapshot::new("R1", "10.0.0.1");
        r1.interfaces.push(Interface::new("eth1", InterfaceKind::Ethernet));
        r1.neighbors.push(NeighborRecord::new("eth1", "R2"));
        let mut r2 = Snapshot::new("R2", "10.0.0.2");
        r2.interfaces.push(Interface::new("eth1", InterfaceKind::Ethernet));
        r2.neighbors.push(NeighborRecord::new("eth1", "R1"));
        vec![success(r1), success(r2)]
    }

    #[test]
    fn test_build_inventory_counts() {
        let mut results = linked_pair();
        results.push(CollectionResult::Failure {
            target: Target::new("10.0.0.3"),
            error: ConnectionError::Authentication {
                address: "10.0.0.3".to_string(),
            }
            .into(),
            attempts: 2,
        });

        let inventory = build_inventory(results, &AnalysisOptions::default());

        assert_eq!(inventory.results.len(), 3);
        assert_eq!(inventory.failures().count(), 1);
        assert_eq!(inventory.links.len(), 1);
        assert_eq!(inventory.stats.total_devices, 3);
        assert_eq!(inventory.stats.collected_devices, 2);
        assert_eq!(inventory.stats.failed_devices, 1);
        assert_eq!(inventory.stats.total_interfaces, 2);
        assert_eq!(inventory.stats.backbone_links, 1);
        // both eth1 ports lack a comment
        assert_eq!(inventory.stats.info_anomalies, 2);
        assert_eq!(inventory.stats.total_anomalies, inventory.anomalies.len());
    }

    #[test]
    fn test_analysis_disabled_keeps_results() {
        let options = AnalysisOptions {
            enabled: false,
            ..AnalysisOptions::default()
        };
        let inventory = build_inventory(linked_pair(), &options);
        assert_eq!(inventory.results.len(), 2);
        assert!(inventory.links.is_empty());
        assert!(inventory.anomalies.is_empty());
    }

    #[test]
    fn test_idle_pppoe_scenario() {
        let mut s = Snapshot::new("S", "10.0.0.9");
        s.pppoe_credentials.push(PppoeCredential {
            username: "alice".to_string(),
            service: None,
            remote_address: None,
            profile: None,
            enabled: true,
        });
        let inventory = build_inventory(vec![success(s)], &AnalysisOptions::default());

        assert!(inventory.links.iter().all(|l| l.link_type != LinkType::Pppoe));
        let pppoe: Vec<&Anomaly> = inventory
            .anomalies
            .iter()
            .filter(|a| a.kind == crate::model::AnomalyKind::ExcessInactivePppoe)
            .collect();
        assert_eq!(pppoe.len(), 1);
        assert_eq!(pppoe[0].device, "S");
    }

    #[test]
    fn test_inventory_serializes() {
        let inventory = build_inventory(linked_pair(), &AnalysisOptions::default());
        let json = serde_json::to_value(&inventory).unwrap();
        assert_eq!(json["results"][0]["status"], "success");
        assert_eq!(json["links"][0]["link_type"], "backbone");
        assert_eq!(json["stats"]["total_links"], 1);
    }

    #[tokio::test]
    async fn test_run_against_replayed_captures() {
        let dir = std::env::temp_dir().join(format!("fleetmap-run-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for (address, identity, peer) in [("10.0.0.1", "R1", "R2"), ("10.0.0.2", "R2", "R1")] {
            let capture = serde_json::json!({
                "/system/identity": [{ "name": identity }],
                "/system/resource": [{ "version": "7.12", "cpu-load": "3",
                                       "free-memory": "600", "total-memory": "1000" }],
                "/interface": [{ "name": "eth1", "type": "ether", "comment": "core" }],
                "/ip/address": [{ "address": format!("{}/24", address), "interface": "eth1" }],
                "/ip/neighbor": [{ "interface": "eth1", "identity": peer }],
                "/ppp/active": [],
                "/ppp/secret": [],
                "/interface/wireless": []
            });
            std::fs::write(dir.join(format!("{}.json", address)), capture.to_string()).unwrap();
        }

        let config = Config::from_toml(
            r#"
            [[targets]]
            address = "10.0.0.1"

            [[targets]]
            address = "10.0.0.2"

            [[targets]]
            address = "10.0.0.3"

            [collection]
            retry_attempts = 1
            "#,
        )
        .unwrap();

        let inventory = run(Arc::new(ReplayConnector::new(&dir)), &config).await.unwrap();

        assert_eq!(inventory.results.len(), 3);
        assert_eq!(inventory.stats.collected_devices, 2);
        assert_eq!(inventory.links.len(), 1);
        assert!(inventory.links[0].connects("R1", "R2"));
        assert!(inventory.anomalies.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }
}
