//! Typed per-device state, as built from one successful collection.

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use serde::Serialize;
use std::net::IpAddr;

use crate::session::Category;

/// Broad interface family, derived from the device's reported type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Ethernet,
    Bridge,
    Wireless,
    Vlan,
    Other,
}

impl InterfaceKind {
    pub fn from_type(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "ether" | "ethernet" => InterfaceKind::Ethernet,
            "bridge" => InterfaceKind::Bridge,
            "wlan" | "wifi" | "wireless" | "wifiwave2" | "w60g" => InterfaceKind::Wireless,
            "vlan" => InterfaceKind::Vlan,
            _ => InterfaceKind::Other,
        }
    }

    /// Ethernet and bridge ports, the kinds that make up a backbone.
    pub fn is_backbone(&self) -> bool {
        matches!(self, InterfaceKind::Ethernet | InterfaceKind::Bridge)
    }
}

/// Role of a wireless interface within its radio link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WirelessRole {
    Station,
    AccessPoint,
    Other,
}

impl WirelessRole {
    /// Map a reported radio mode (`station-bridge`, `ap-bridge`, ...) to a role.
    pub fn from_mode(mode: &str) -> Self {
        let mode = mode.trim().to_ascii_lowercase();
        if mode.starts_with("station") {
            WirelessRole::Station
        } else if mode.starts_with("ap") || mode == "bridge" || mode == "wds-slave" {
            WirelessRole::AccessPoint
        } else {
            WirelessRole::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interface {
    pub name: String,
    pub kind: InterfaceKind,
    pub enabled: bool,
    pub running: bool,
    pub wireless_role: Option<WirelessRole>,
    pub comment: Option<String>,
    pub mac_address: Option<String>,
}

impl Interface {
    pub fn new(name: &str, kind: InterfaceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            enabled: true,
            running: true,
            wireless_role: None,
            comment: None,
            mac_address: None,
        }
    }

    pub fn is_wireless(&self) -> bool {
        self.kind == InterfaceKind::Wireless || self.wireless_role.is_some()
    }

    pub fn has_comment(&self) -> bool {
        self.comment.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub cidr: IpNetwork,
    pub interface: String,
    pub enabled: bool,
}

/// What one device's discovery protocol reports about an adjacent device.
/// Unverified until cross-matched against the other snapshots of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborRecord {
    pub interface: String,
    pub identity: String,
    pub address: Option<IpAddr>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub mac_address: Option<String>,
    /// Manufacturer resolved from `mac_address`, for reporting only
    pub vendor: Option<String>,
}

impl NeighborRecord {
    pub fn new(interface: &str, identity: &str) -> Self {
        Self {
            interface: interface.to_string(),
            identity: identity.to_string(),
            address: None,
            platform: None,
            version: None,
            mac_address: None,
            vendor: None,
        }
    }
}

/// An active PPPoE session as seen by the serving device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PppoeSession {
    pub username: String,
    pub service: Option<String>,
    pub address: Option<IpAddr>,
    pub caller_id: Option<String>,
    pub uptime: Option<String>,
}

/// A configured PPPoE account (secret) on the serving device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PppoeCredential {
    pub username: String,
    pub service: Option<String>,
    pub remote_address: Option<IpAddr>,
    pub profile: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemResource {
    pub version: String,
    pub uptime: String,
    /// CPU load in percent
    pub cpu_load: Option<u8>,
    pub free_memory: Option<u64>,
    pub total_memory: Option<u64>,
    pub board_name: Option<String>,
    pub architecture: Option<String>,
}

impl SystemResource {
    /// Used memory in percent, when both counters were reported.
    pub fn memory_usage_percent(&self) -> Option<f64> {
        match (self.free_memory, self.total_memory) {
            (Some(free), Some(total)) if total > 0 && free <= total => {
                Some((total - free) as f64 / total as f64 * 100.0)
            }
            _ => None,
        }
    }
}

/// A fetch category that failed on a reachable device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryFailure {
    pub category: Category,
    pub message: String,
}

/// The validated state of one device at poll time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub identity: String,
    pub management_address: String,
    pub collected_at: DateTime<Utc>,
    pub resource: Option<SystemResource>,
    pub interfaces: Vec<Interface>,
    pub addresses: Vec<Address>,
    pub neighbors: Vec<NeighborRecord>,
    pub pppoe_sessions: Vec<PppoeSession>,
    pub pppoe_credentials: Vec<PppoeCredential>,
    pub category_errors: Vec<CategoryFailure>,
    pub dropped_records: usize,
}

impl Snapshot {
    /// An empty snapshot; categories are filled in by the builder.
    pub fn new(identity: &str, management_address: &str) -> Self {
        Self {
            identity: identity.to_string(),
            management_address: management_address.to_string(),
            collected_at: Utc::now(),
            resource: None,
            interfaces: Vec::new(),
            addresses: Vec::new(),
            neighbors: Vec::new(),
            pppoe_sessions: Vec::new(),
            pppoe_credentials: Vec::new(),
            category_errors: Vec::new(),
            dropped_records: 0,
        }
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn has_interface(&self, name: &str) -> bool {
        self.interface(name).is_some()
    }

    /// Every IP this device answers to: its management address (when it is
    /// an IP) plus the host part of each configured address.
    pub fn owned_ips(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.management_address
            .parse::<IpAddr>()
            .ok()
            .into_iter()
            .chain(self.addresses.iter().map(|a| a.cidr.ip()))
    }
}
