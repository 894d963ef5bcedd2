//! Per-category record schemas.
//!
//! Field names follow the device's kebab-case naming. A missing field takes
//! its default; a present field of the wrong shape rejects the record.
//! RouterOS reports most scalars as strings, so booleans and counters accept
//! both native JSON values and their string forms.

use ipnetwork::IpNetwork;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::net::IpAddr;

use crate::error::ValidationError;
use crate::model::{
    Address, Interface, InterfaceKind, NeighborRecord, PppoeCredential, PppoeSession,
    SystemResource, WirelessRole,
};
use crate::oui;
use crate::session::Category;

fn flex_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(true),
            "false" | "no" | "" => Ok(false),
            other => Err(D::Error::custom(format!("invalid boolean {:?}", other))),
        },
        Some(other) => Err(D::Error::custom(format!("invalid boolean {}", other))),
    }
}

fn flex_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid counter {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid counter {:?}", s))),
        Some(other) => Err(D::Error::custom(format!("invalid counter {}", other))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Optional IP field. RouterOS leaves unassigned addresses empty.
fn parse_ip(category: Category, field: &str, value: Option<String>) -> Result<Option<IpAddr>, ValidationError> {
    match non_blank(value) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<IpAddr>()
            .map(Some)
            .map_err(|_| ValidationError::new(category.as_str(), format!("invalid {} {:?}", field, v))),
    }
}

fn require_name(category: Category, field: &str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(category.as_str(), format!("missing {}", field)));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(super) struct IdentityRow {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(super) struct ResourceRow {
    version: String,
    uptime: String,
    #[serde(deserialize_with = "flex_u64")]
    cpu_load: Option<u64>,
    #[serde(deserialize_with = "flex_u64")]
    free_memory: Option<u64>,
    #[serde(deserialize_with = "flex_u64")]
    total_memory: Option<u64>,
    board_name: Option<String>,
    architecture_name: Option<String>,
}

impl ResourceRow {
    pub fn into_resource(self) -> Result<SystemResource, ValidationError> {
        let cpu_load = match self.cpu_load {
            Some(load) if load > 100 => {
                return Err(ValidationError::new(
                    Category::SystemInfo.as_str(),
                    format!("cpu-load {} out of range", load),
                ));
            }
            Some(load) => Some(load as u8),
            None => None,
        };

        Ok(SystemResource {
            version: self.version.trim().to_string(),
            uptime: self.uptime,
            cpu_load,
            free_memory: self.free_memory,
            total_memory: self.total_memory,
            board_name: non_blank(self.board_name),
            architecture: non_blank(self.architecture_name),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(super) struct InterfaceRow {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    mac_address: Option<String>,
    #[serde(deserialize_with = "flex_bool")]
    disabled: bool,
    #[serde(deserialize_with = "flex_bool")]
    running: bool,
    comment: Option<String>,
}

impl InterfaceRow {
    pub fn into_interface(self) -> Result<Interface, ValidationError> {
        let name = require_name(Category::Interfaces, "name", self.name)?;
        let mut iface = Interface::new(&name, InterfaceKind::from_type(&self.kind));
        iface.enabled = !self.disabled;
        iface.running = self.running;
        iface.comment = non_blank(self.comment);
        iface.mac_address = non_blank(self.mac_address).map(|m| oui::normalize_mac(&m).unwrap_or(m));
        Ok(iface)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(super) struct WirelessRow {
    pub name: String,
    pub mode: Option<String>,
    #[serde(deserialize_with = "flex_bool")]
    pub disabled: bool,
    pub comment: Option<String>,
}

impl WirelessRow {
    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = require_name(Category::Wireless, "name", self.name)?;
        Ok(Self {
            name,
            mode: non_blank(self.mode),
            disabled: self.disabled,
            comment: non_blank(self.comment),
        })
    }

    pub fn role(&self) -> WirelessRole {
        self.mode
            .as_deref()
            .map(WirelessRole::from_mode)
            .unwrap_or(WirelessRole::Other)
    }

    /// Stand-in for a radio whose interface list entry was not collected.
    pub fn into_interface(self) -> Interface {
        let mut iface = Interface::new(&self.name, InterfaceKind::Wireless);
        iface.wireless_role = Some(self.role());
        iface.enabled = !self.disabled;
        iface.running = !self.disabled;
        iface.comment = self.comment;
        iface
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(super) struct AddressRow {
    address: String,
    interface: String,
    #[serde(deserialize_with = "flex_bool")]
    disabled: bool,
}

impl AddressRow {
    pub fn into_address(self) -> Result<Address, ValidationError> {
        let category = Category::IpAddresses.as_str();
        let interface = require_name(Category::IpAddresses, "interface", self.interface)?;
        let cidr = self
            .address
            .trim()
            .parse::<IpNetwork>()
            .map_err(|_| ValidationError::new(category, format!("invalid address {:?}", self.address)))?;
        Ok(Address {
            cidr,
            interface,
            enabled: !self.disabled,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(super) struct NeighborRow {
    interface: String,
    identity: String,
    address: Option<String>,
    address4: Option<String>,
    platform: Option<String>,
    version: Option<String>,
    mac_address: Option<String>,
}

impl NeighborRow {
    pub fn into_neighbor(self) -> Result<NeighborRecord, ValidationError> {
        let category = Category::Neighbors;
        let interface = require_name(category, "interface", self.interface)?;
        // Newer releases split the address by family; the IPv4 one is what peers own
        let address = match non_blank(self.address4) {
            Some(v4) => parse_ip(category, "address4", Some(v4))?,
            None => parse_ip(category, "address", self.address)?,
        };
        let identity = self.identity.trim().to_string();
        if identity.is_empty() && address.is_none() {
            return Err(ValidationError::new(
                category.as_str(),
                "neighbor has neither identity nor address",
            ));
        }

        let mut neighbor = NeighborRecord::new(&interface, &identity);
        neighbor.address = address;
        neighbor.platform = non_blank(self.platform);
        neighbor.version = non_blank(self.version);
        neighbor.mac_address = non_blank(self.mac_address).map(|m| oui::normalize_mac(&m).unwrap_or(m));
        neighbor.vendor = neighbor.mac_address.as_deref().and_then(oui::lookup_vendor);
        Ok(neighbor)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(super) struct PppActiveRow {
    name: String,
    service: Option<String>,
    address: Option<String>,
    caller_id: Option<String>,
    uptime: Option<String>,
}

impl PppActiveRow {
    pub fn into_session(self) -> Result<PppoeSession, ValidationError> {
        let category = Category::PppoeActive;
        Ok(PppoeSession {
            username: require_name(category, "name", self.name)?,
            service: non_blank(self.service),
            address: parse_ip(category, "address", self.address)?,
            caller_id: non_blank(self.caller_id),
            uptime: non_blank(self.uptime),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(super) struct PppSecretRow {
    name: String,
    service: Option<String>,
    profile: Option<String>,
    remote_address: Option<String>,
    #[serde(deserialize_with = "flex_bool")]
    disabled: bool,
}

impl PppSecretRow {
    pub fn into_credential(self) -> Result<PppoeCredential, ValidationError> {
        let category = Category::PppoeSecrets;
        Ok(PppoeCredential {
            username: require_name(category, "name", self.name)?,
            service: non_blank(self.service),
            remote_address: parse_ip(category, "remote-address", self.remote_address)?,
            profile: non_blank(self.profile),
            enabled: !self.disabled,
        })
    }
}
