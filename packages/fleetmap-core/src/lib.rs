//! fleetmap Core Library
//!
//! This crate provides the core functionality for polling a fleet of
//! RouterOS-style devices and turning what they report into an inventory:
//! - Concurrent collection (bounded fan-out, per-device retry and isolation)
//! - Snapshot building (per-category schemas, invalid records dropped)
//! - Topology inference (reciprocal neighbor links, PPPoE links)
//! - Anomaly detection (independent, toggleable rules)
//!
//! The device protocol itself is behind [`session::DeviceConnector`];
//! [`session::ReplayConnector`] serves captured device output from disk.
//!
//! # Example
//!
//! ```no_run
//! use fleetmap_core::{config, inventory, session::ReplayConnector};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let loaded = config::load_config(None)?;
//!     let connector = Arc::new(ReplayConnector::new("captures"));
//!
//!     let inventory = inventory::run(connector, &loaded.config).await?;
//!     println!(
//!         "{} devices, {} links, {} anomalies",
//!         inventory.stats.collected_devices,
//!         inventory.stats.total_links,
//!         inventory.stats.total_anomalies
//!     );
//!     Ok(())
//! }
//! ```

pub mod anomaly;
pub mod collector;
pub mod config;
pub mod error;
pub mod inventory;
pub mod model;
pub mod oui;
pub mod session;
pub mod snapshot;
pub mod topology;

// Re-export commonly used types
pub use anomaly::{detect, AnomalyOptions, AnomalyRule, RuleToggles, Thresholds};
pub use collector::{collect, Backoff, CollectOptions, RetryPolicy};
pub use config::{Config, ConfigSource, LoadedConfig};
pub use error::{CollectError, CommandError, ConnectionError, ValidationError};
pub use inventory::{build_inventory, run, AnalysisOptions};
pub use model::{
    Anomaly, AnomalyKind, CollectionResult, Inventory, InventoryStats, Link, LinkType, Severity,
    Snapshot, Target,
};
pub use session::{Category, CategoryToggles, DeviceConnector, DeviceSession, RawRecord, ReplayConnector};
pub use topology::{infer, StationPolicy, TopologyOptions};
