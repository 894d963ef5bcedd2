//! Boundary to the per-device remote-command protocol.
//!
//! A [`DeviceConnector`] opens one [`DeviceSession`] per target; the session
//! answers "give me the records at this path". Every fetch can fail on its
//! own. The wire client itself lives outside this crate; [`ReplayConnector`]
//! serves captured device output from disk through the same traits.

mod replay;

pub use replay::ReplayConnector;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CommandError, ConnectionError, ValidationError};
use crate::model::Target;

/// Path holding the device's own name. Fetched on every attempt.
pub const IDENTITY_PATH: &str = "/system/identity";

#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn open(&self, target: &Target) -> Result<Box<dyn DeviceSession>, ConnectionError>;
}

#[async_trait]
pub trait DeviceSession: Send {
    async fn fetch(&mut self, path: &str) -> Result<Vec<RawRecord>, CommandError>;

    async fn close(&mut self) {}
}

/// An untyped field map, exactly as the device returned it for one path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Decode into a typed per-category row.
    pub fn decode<T: DeserializeOwned>(&self, category: &'static str) -> Result<T, ValidationError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| ValidationError::new(category, e.to_string()))
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The optional data categories a pipeline can fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SystemInfo,
    Interfaces,
    Wireless,
    IpAddresses,
    Neighbors,
    PppoeActive,
    PppoeSecrets,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::SystemInfo,
        Category::Interfaces,
        Category::Wireless,
        Category::IpAddresses,
        Category::Neighbors,
        Category::PppoeActive,
        Category::PppoeSecrets,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Category::SystemInfo => "/system/resource",
            Category::Interfaces => "/interface",
            Category::Wireless => "/interface/wireless",
            Category::IpAddresses => "/ip/address",
            Category::Neighbors => "/ip/neighbor",
            Category::PppoeActive => "/ppp/active",
            Category::PppoeSecrets => "/ppp/secret",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SystemInfo => "system_info",
            Category::Interfaces => "interfaces",
            Category::Wireless => "wireless",
            Category::IpAddresses => "ip_addresses",
            Category::Neighbors => "neighbors",
            Category::PppoeActive => "pppoe_active",
            Category::PppoeSecrets => "pppoe_secrets",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which categories to fetch. A disabled category is simply not requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryToggles {
    pub system_info: bool,
    pub interfaces: bool,
    pub ip_addresses: bool,
    pub neighbors: bool,
    pub pppoe_active: bool,
    pub pppoe_secrets: bool,
    pub wireless: bool,
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            system_info: true,
            interfaces: true,
            ip_addresses: true,
            neighbors: true,
            pppoe_active: true,
            pppoe_secrets: true,
            wireless: true,
        }
    }
}

impl CategoryToggles {
    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::SystemInfo => self.system_info,
            Category::Interfaces => self.interfaces,
            Category::Wireless => self.wireless,
            Category::IpAddresses => self.ip_addresses,
            Category::Neighbors => self.neighbors,
            Category::PppoeActive => self.pppoe_active,
            Category::PppoeSecrets => self.pppoe_secrets,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(|c| self.is_enabled(*c))
    }
}
