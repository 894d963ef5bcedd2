use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// The configuration conditions the detector knows how to flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    MultipleAddresses,
    DisabledInterfaceWithAddress,
    UnknownNeighbor,
    ExcessInactivePppoe,
    UncommentedInterface,
    OutdatedFirmware,
    ResourcePressure,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 7] = [
        AnomalyKind::MultipleAddresses,
        AnomalyKind::DisabledInterfaceWithAddress,
        AnomalyKind::UnknownNeighbor,
        AnomalyKind::ExcessInactivePppoe,
        AnomalyKind::UncommentedInterface,
        AnomalyKind::OutdatedFirmware,
        AnomalyKind::ResourcePressure,
    ];

    /// Fixed severity tier of each kind.
    pub fn severity(&self) -> Severity {
        match self {
            AnomalyKind::MultipleAddresses => Severity::Info,
            AnomalyKind::DisabledInterfaceWithAddress => Severity::Warning,
            AnomalyKind::UnknownNeighbor => Severity::Info,
            AnomalyKind::ExcessInactivePppoe => Severity::Info,
            AnomalyKind::UncommentedInterface => Severity::Info,
            AnomalyKind::OutdatedFirmware => Severity::Warning,
            AnomalyKind::ResourcePressure => Severity::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::MultipleAddresses => "multiple_addresses",
            AnomalyKind::DisabledInterfaceWithAddress => "disabled_interface_with_address",
            AnomalyKind::UnknownNeighbor => "unknown_neighbor",
            AnomalyKind::ExcessInactivePppoe => "excess_inactive_pppoe",
            AnomalyKind::UncommentedInterface => "uncommented_interface",
            AnomalyKind::OutdatedFirmware => "outdated_firmware",
            AnomalyKind::ResourcePressure => "resource_pressure",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub device: String,
    pub interface: Option<String>,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    pub suggestion: Option<String>,
}

impl Anomaly {
    /// A new anomaly with the kind's fixed severity.
    pub fn new(device: &str, kind: AnomalyKind, description: impl Into<String>) -> Self {
        Self {
            device: device.to_string(),
            interface: None,
            kind,
            severity: kind.severity(),
            description: description.into(),
            suggestion: None,
        }
    }

    pub fn on_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestion = Some(suggestion.to_string());
        self
    }
}
