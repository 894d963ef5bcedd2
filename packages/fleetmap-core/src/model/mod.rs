//! Data model shared by the collector, the analyzers and the report.

mod anomaly;
mod device;
mod link;

pub use anomaly::{Anomaly, AnomalyKind, Severity};
pub use device::{
    Address, CategoryFailure, Interface, InterfaceKind, NeighborRecord, PppoeCredential,
    PppoeSession, Snapshot, SystemResource, WirelessRole,
};
pub use link::{Endpoint, Link, LinkEvidence, LinkType};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::error::{serialize_display, CollectError};

/// Default RouterOS API port
pub const DEFAULT_PORT: u16 = 8728;

/// Default per-target timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Default, PartialEq, Serialize)]
pub struct Credentials {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One device to poll, with its connection parameters for this run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub name: Option<String>,
    pub address: String,
    pub port: u16,
    pub credentials: Credentials,
    #[serde(rename = "timeout_secs", serialize_with = "serialize_secs")]
    pub timeout: Duration,
}

impl Target {
    pub fn new(address: &str) -> Self {
        Self {
            name: None,
            address: address.to_string(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name for logs and reports: the configured name, else the address.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// The outcome of one device's pipeline. Exactly one per requested target.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionResult {
    Success {
        snapshot: Snapshot,
        attempts: u32,
    },
    Failure {
        target: Target,
        #[serde(serialize_with = "serialize_display")]
        error: CollectError,
        attempts: u32,
    },
}

impl CollectionResult {
    pub fn attempts(&self) -> u32 {
        match self {
            CollectionResult::Success { attempts, .. } => *attempts,
            CollectionResult::Failure { attempts, .. } => *attempts,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            CollectionResult::Success { snapshot, .. } => Some(snapshot),
            CollectionResult::Failure { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CollectionResult::Success { .. })
    }

    pub fn error(&self) -> Option<&CollectError> {
        match self {
            CollectionResult::Success { .. } => None,
            CollectionResult::Failure { error, .. } => Some(error),
        }
    }
}

/// Summary counters over one inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryStats {
    pub total_devices: usize,
    pub collected_devices: usize,
    pub failed_devices: usize,
    pub total_interfaces: usize,
    pub total_neighbors: usize,
    pub total_links: usize,
    pub backbone_links: usize,
    pub ptp_links: usize,
    pub ptmp_links: usize,
    pub pppoe_links: usize,
    pub total_anomalies: usize,
    pub critical_anomalies: usize,
    pub warning_anomalies: usize,
    pub info_anomalies: usize,
}

/// The final, immutable output of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    pub generated_at: DateTime<Utc>,
    pub results: Vec<CollectionResult>,
    pub links: Vec<Link>,
    pub anomalies: Vec<Anomaly>,
    pub stats: InventoryStats,
}

impl Inventory {
    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.results.iter().filter_map(CollectionResult::snapshot)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CollectionResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionError;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("admin", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_target_serialization_omits_password() {
        let target = Target::new("10.0.0.1")
            .with_credentials(Credentials::new("admin", "hunter2"))
            .with_timeout(Duration::from_millis(2500));
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["credentials"]["username"], "admin");
        assert!(json["credentials"].get("password").is_none());
        assert_eq!(json["timeout_secs"], 2.5);
        assert_eq!(target.label(), "10.0.0.1");
        assert_eq!(target.with_name("core").label(), "core");
    }

    #[test]
    fn test_failure_serializes_error_text() {
        let result = CollectionResult::Failure {
            target: Target::new("10.0.0.9"),
            error: ConnectionError::Unreachable {
                address: "10.0.0.9".to_string(),
                reason: "no route".to_string(),
            }
            .into(),
            attempts: 3,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error"], "10.0.0.9 unreachable: no route");
        assert_eq!(json["attempts"], 3);
        assert_eq!(result.attempts(), 3);
        assert!(result.snapshot().is_none());
    }
}
