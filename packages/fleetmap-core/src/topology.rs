//! Topology inference
//!
//! Links come from two places: neighbor-discovery records that both devices
//! confirm about each other, and PPPoE accounts with a live session on the
//! serving device. One-sided neighbor sightings never produce a link.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;
use tracing::{debug, info};

use crate::model::{
    Endpoint, Interface, Link, LinkEvidence, LinkType, NeighborRecord, Snapshot, WirelessRole,
};

/// Confidence of a reciprocal neighbor link with both interfaces known
pub const CONFIRMED_CONFIDENCE: f64 = 0.9;

/// Confidence of a reciprocal neighbor link when an interface was not collected
pub const PARTIAL_CONFIDENCE: f64 = 0.6;

/// Confidence of a link backed by a live PPPoE session
pub const PPPOE_CONFIDENCE: f64 = 1.0;

/// How to type a station that confirms more than one access point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationPolicy {
    #[default]
    PointToMultipoint,
    PointToPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyOptions {
    pub enabled: bool,
    /// Links below this confidence are dropped
    pub min_confidence: f64,
    pub station_policy: StationPolicy,
}

impl Default for TopologyOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: 0.0,
            station_policy: StationPolicy::default(),
        }
    }
}

/// Lookup from the names and addresses a device answers to.
///
/// Repeated snapshots of the same device (same identity and management
/// address) collapse to the first one seen. Distinct devices that share an
/// identity are all kept; name lookups resolve to the first of them.
pub(crate) struct DeviceIndex<'a> {
    devices: Vec<&'a Snapshot>,
    by_name: HashMap<&'a str, usize>,
    by_ip: HashMap<IpAddr, usize>,
}

impl<'a> DeviceIndex<'a> {
    pub fn new(snapshots: &'a [Snapshot]) -> Self {
        let mut index = Self {
            devices: Vec::new(),
            by_name: HashMap::new(),
            by_ip: HashMap::new(),
        };
        let mut seen = HashSet::new();

        for snapshot in snapshots {
            let key = (snapshot.identity.as_str(), snapshot.management_address.as_str());
            if !seen.insert(key) {
                debug!(
                    "Ignoring duplicate snapshot for {} at {}",
                    snapshot.identity, snapshot.management_address
                );
                continue;
            }
            let slot = index.devices.len();
            index.devices.push(snapshot);
            index.by_name.entry(snapshot.identity.as_str()).or_insert(slot);
            index
                .by_name
                .entry(snapshot.management_address.as_str())
                .or_insert(slot);
            for ip in snapshot.owned_ips() {
                index.by_ip.entry(ip).or_insert(slot);
            }
        }
        index
    }

    pub fn devices(&self) -> &[&'a Snapshot] {
        &self.devices
    }

    /// Which device a neighbor record refers to: by identity, then by address.
    pub fn resolve(&self, neighbor: &NeighborRecord) -> Option<usize> {
        let by_name = if neighbor.identity.is_empty() {
            None
        } else {
            self.by_name.get(neighbor.identity.as_str()).copied()
        };
        by_name.or_else(|| neighbor.address.and_then(|ip| self.by_ip.get(&ip).copied()))
    }
}

/// A neighbor relationship both sides confirmed.
struct Adjacency<'a> {
    near: usize,
    near_interface: &'a str,
    far: usize,
    far_interface: &'a str,
}

/// Infer links from one batch of snapshots. Pure and deterministic.
pub fn infer(snapshots: &[Snapshot], options: &TopologyOptions) -> Vec<Link> {
    if !options.enabled {
        return Vec::new();
    }

    let index = DeviceIndex::new(snapshots);
    let devices = index.devices();

    let adjacencies = confirmed_adjacencies(&index);
    let peers = wireless_peers(devices, &adjacencies);

    let mut links: BTreeMap<(String, String, LinkType), Link> = BTreeMap::new();

    for adj in &adjacencies {
        let near = devices[adj.near];
        let far = devices[adj.far];
        let near_iface = near.interface(adj.near_interface);
        let far_iface = far.interface(adj.far_interface);

        let link_type = classify(
            (adj.near, adj.near_interface, near_iface),
            (adj.far, adj.far_interface, far_iface),
            &peers,
            options.station_policy,
        );
        let confidence = if near_iface.is_some() && far_iface.is_some() {
            CONFIRMED_CONFIDENCE
        } else {
            PARTIAL_CONFIDENCE
        };

        let mut link = Link::new(
            Endpoint::new(&near.identity, adj.near_interface),
            Endpoint::new(&far.identity, adj.far_interface),
            link_type,
            confidence,
        );
        link.evidence = vec![
            LinkEvidence {
                device: near.identity.clone(),
                interface: adj.near_interface.to_string(),
                reported: far.identity.clone(),
            },
            LinkEvidence {
                device: far.identity.clone(),
                interface: adj.far_interface.to_string(),
                reported: near.identity.clone(),
            },
        ];
        merge(&mut links, link);
    }

    for device in devices {
        for link in pppoe_links(device) {
            merge(&mut links, link);
        }
    }

    let out: Vec<Link> = links
        .into_values()
        .filter(|l| l.confidence >= options.min_confidence)
        .collect();
    info!(
        "Inferred {} link(s) across {} device(s)",
        out.len(),
        devices.len()
    );
    out
}

fn compatible(near: Option<&Interface>, far: Option<&Interface>) -> bool {
    match (near, far) {
        (Some(near), Some(far)) => near.is_wireless() == far.is_wireless(),
        _ => true,
    }
}

fn confirmed_adjacencies<'a>(index: &DeviceIndex<'a>) -> Vec<Adjacency<'a>> {
    let devices = index.devices();
    let mut out = Vec::new();

    for (near, snapshot) in devices.iter().copied().enumerate() {
        for record in &snapshot.neighbors {
            let Some(far) = index.resolve(record).filter(|far| *far != near) else {
                continue;
            };
            let far_snapshot: &'a Snapshot = devices[far];
            let near_iface = snapshot.interface(&record.interface);

            let reciprocal = far_snapshot.neighbors.iter().find(|back| {
                index.resolve(back) == Some(near)
                    && compatible(near_iface, far_snapshot.interface(&back.interface))
            });

            match reciprocal {
                Some(back) => out.push(Adjacency {
                    near,
                    near_interface: record.interface.as_str(),
                    far,
                    far_interface: back.interface.as_str(),
                }),
                None => debug!(
                    "{} sees {} on {} but it does not see {} back",
                    snapshot.identity, far_snapshot.identity, record.interface, snapshot.identity
                ),
            }
        }
    }
    out
}

/// Distinct confirmed peer devices per wireless interface.
fn wireless_peers<'a>(
    devices: &[&'a Snapshot],
    adjacencies: &[Adjacency<'a>],
) -> HashMap<(usize, &'a str), HashSet<usize>> {
    let mut peers: HashMap<(usize, &'a str), HashSet<usize>> = HashMap::new();
    for adj in adjacencies {
        let wireless = |device: usize, name: &str| {
            devices[device]
                .interface(name)
                .is_some_and(Interface::is_wireless)
        };
        if wireless(adj.near, adj.near_interface) {
            peers
                .entry((adj.near, adj.near_interface))
                .or_default()
                .insert(adj.far);
        }
        if wireless(adj.far, adj.far_interface) {
            peers
                .entry((adj.far, adj.far_interface))
                .or_default()
                .insert(adj.near);
        }
    }
    peers
}

fn classify<'a>(
    near: (usize, &'a str, Option<&Interface>),
    far: (usize, &'a str, Option<&Interface>),
    peers: &HashMap<(usize, &'a str), HashSet<usize>>,
    policy: StationPolicy,
) -> LinkType {
    let is_wireless = |iface: Option<&Interface>| iface.is_some_and(Interface::is_wireless);
    if !is_wireless(near.2) && !is_wireless(far.2) {
        let is_backbone = |iface: Option<&Interface>| iface.is_some_and(|i| i.kind.is_backbone());
        // Backbone needs both ports known to be wired
        return if is_backbone(near.2) && is_backbone(far.2) {
            LinkType::Backbone
        } else {
            LinkType::PointToPoint
        };
    }

    let role = |iface: Option<&Interface>| iface.and_then(|i| i.wireless_role);
    let peer_count = |key: (usize, &'a str)| peers.get(&key).map_or(0, HashSet::len);

    let (station, ap) = match (role(near.2), role(far.2)) {
        (Some(WirelessRole::Station), Some(WirelessRole::AccessPoint)) => (near, far),
        (Some(WirelessRole::AccessPoint), Some(WirelessRole::Station)) => (far, near),
        _ => return LinkType::PointToPoint,
    };

    if peer_count((station.0, station.1)) > 1 {
        return match policy {
            StationPolicy::PointToMultipoint => LinkType::PointToMultipoint,
            StationPolicy::PointToPoint => LinkType::PointToPoint,
        };
    }
    if peer_count((ap.0, ap.1)) > 1 {
        LinkType::PointToMultipoint
    } else {
        LinkType::PointToPoint
    }
}

/// Links for enabled PPPoE accounts with an active session on this device.
fn pppoe_links(device: &Snapshot) -> Vec<Link> {
    device
        .pppoe_credentials
        .iter()
        .filter(|credential| credential.enabled)
        .filter_map(|credential| {
            let session = device
                .pppoe_sessions
                .iter()
                .find(|s| s.username == credential.username)?;
            let service = session.service.as_deref().unwrap_or("pppoe");
            let client = match session.address {
                Some(ip) => format!("pppoe:{}", ip),
                None => format!("pppoe:{}", session.username),
            };

            let mut link = Link::new(
                Endpoint::new(&device.identity, service),
                Endpoint::new(&client, &session.username),
                LinkType::Pppoe,
                PPPOE_CONFIDENCE,
            );
            link.evidence.push(LinkEvidence {
                device: device.identity.clone(),
                interface: service.to_string(),
                reported: format!("active session {}", session.username),
            });
            Some(link)
        })
        .collect()
}

/// Fold a link into the map, one entry per unordered device pair and type.
fn merge(links: &mut BTreeMap<(String, String, LinkType), Link>, link: Link) {
    let key = {
        let (a, b, link_type) = link.key();
        (a.to_string(), b.to_string(), link_type)
    };
    match links.get_mut(&key) {
        Some(existing) => {
            let pair = (&link.a.interface, &link.b.interface);
            if pair < (&existing.a.interface, &existing.b.interface) {
                existing.a = link.a.clone();
                existing.b = link.b.clone();
            }
            existing.confidence = existing.confidence.max(link.confidence);
            existing.evidence.extend(link.evidence);
            existing.evidence.sort();
            existing.evidence.dedup();
        }
        None => {
            let mut link = link;
            link.evidence.sort();
            link.evidence.dedup();
            links.insert(key, link);
        }
    }
}
