use serde::Serialize;

/// One side of a link: a device identity and one of its interfaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Endpoint {
    pub device: String,
    pub interface: String,
}

impl Endpoint {
    pub fn new(device: &str, interface: &str) -> Self {
        Self {
            device: device.to_string(),
            interface: interface.to_string(),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.device, self.interface)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Backbone,
    PointToPoint,
    PointToMultipoint,
    Pppoe,
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkType::Backbone => write!(f, "backbone"),
            LinkType::PointToPoint => write!(f, "ptp"),
            LinkType::PointToMultipoint => write!(f, "ptmp"),
            LinkType::Pppoe => write!(f, "pppoe"),
        }
    }
}

/// A record that contributed to a link: which device reported what, where.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LinkEvidence {
    pub device: String,
    pub interface: String,
    pub reported: String,
}

/// An inferred connection between two devices.
///
/// Endpoints are stored in canonical order (`a <= b`), so the same pair
/// always produces the same link regardless of which side reported first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub a: Endpoint,
    pub b: Endpoint,
    pub link_type: LinkType,
    pub confidence: f64,
    pub evidence: Vec<LinkEvidence>,
}

impl Link {
    pub fn new(x: Endpoint, y: Endpoint, link_type: LinkType, confidence: f64) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self {
            a,
            b,
            link_type,
            confidence,
            evidence: Vec::new(),
        }
    }

    /// Deduplication key: the unordered device pair plus the link type.
    pub fn key(&self) -> (&str, &str, LinkType) {
        (&self.a.device, &self.b.device, self.link_type)
    }

    pub fn connects(&self, first: &str, second: &str) -> bool {
        (self.a.device == first && self.b.device == second)
            || (self.a.device == second && self.b.device == first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_endpoints_are_canonical() {
        let forward = Link::new(
            Endpoint::new("R2", "eth1"),
            Endpoint::new("R1", "eth1"),
            LinkType::Backbone,
            0.9,
        );
        let backward = Link::new(
            Endpoint::new("R1", "eth1"),
            Endpoint::new("R2", "eth1"),
            LinkType::Backbone,
            0.9,
        );
        assert_eq!(forward, backward);
        assert_eq!(forward.a.device, "R1");
        assert_eq!(forward.key(), ("R1", "R2", LinkType::Backbone));
        assert!(forward.connects("R2", "R1"));
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::new("R1", "ether2").to_string(), "R1-ether2");
        assert_eq!(LinkType::PointToMultipoint.to_string(), "ptmp");
    }
}
