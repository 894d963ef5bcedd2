//! Snapshot builder: raw per-path records in, one typed [`Snapshot`] out.
//!
//! Every category goes through an explicit row schema (see `rows`). Records
//! that fail validation are dropped and counted; they never fail the device.

mod rows;

use std::collections::HashSet;
use tracing::debug;

use crate::error::{CommandError, ValidationError};
use crate::model::{CategoryFailure, InterfaceKind, Snapshot};
use crate::session::{Category, RawRecord};
use rows::{
    AddressRow, IdentityRow, InterfaceRow, NeighborRow, PppActiveRow, PppSecretRow, ResourceRow,
    WirelessRow,
};

/// Device name from the identity fetch, falling back to the target address
/// when the device reports none.
pub fn resolve_identity(records: &[RawRecord], fallback: &str) -> String {
    records
        .first()
        .and_then(|r| r.decode::<IdentityRow>("identity").ok())
        .map(|row| row.name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

pub struct SnapshotBuilder {
    snapshot: Snapshot,
    interface_names: HashSet<String>,
    /// Whether the interface list itself was ingested
    interfaces_listed: bool,
    wireless: Vec<WirelessRow>,
}

impl SnapshotBuilder {
    pub fn new(identity: &str, management_address: &str) -> Self {
        Self {
            snapshot: Snapshot::new(identity, management_address),
            interface_names: HashSet::new(),
            interfaces_listed: false,
            wireless: Vec::new(),
        }
    }

    /// Validate and add the records fetched for one category.
    pub fn ingest(&mut self, category: Category, records: &[RawRecord]) {
        match category {
            Category::SystemInfo => {
                // The resource path answers with a single record
                if let Some(record) = records.first() {
                    match record
                        .decode::<ResourceRow>(category.as_str())
                        .and_then(ResourceRow::into_resource)
                    {
                        Ok(resource) => self.snapshot.resource = Some(resource),
                        Err(e) => self.drop_record(e),
                    }
                }
            }
            Category::Interfaces => {
                self.interfaces_listed = true;
                for iface in self.decode_all(category, records, InterfaceRow::into_interface) {
                    if self.interface_names.insert(iface.name.clone()) {
                        self.snapshot.interfaces.push(iface);
                    } else {
                        self.drop_record(ValidationError::new(
                            category.as_str(),
                            format!("duplicate interface {}", iface.name),
                        ));
                    }
                }
            }
            Category::Wireless => {
                let rows = self.decode_all(category, records, WirelessRow::validate);
                self.wireless.extend(rows);
            }
            Category::IpAddresses => {
                let addresses = self.decode_all(category, records, AddressRow::into_address);
                self.snapshot.addresses.extend(addresses);
            }
            Category::Neighbors => {
                let neighbors = self.decode_all(category, records, NeighborRow::into_neighbor);
                self.snapshot.neighbors.extend(neighbors);
            }
            Category::PppoeActive => {
                let sessions = self.decode_all(category, records, PppActiveRow::into_session);
                self.snapshot.pppoe_sessions.extend(sessions);
            }
            Category::PppoeSecrets => {
                let credentials = self.decode_all(category, records, PppSecretRow::into_credential);
                self.snapshot.pppoe_credentials.extend(credentials);
            }
        }
    }

    /// Record that a category could not be fetched. Its field stays empty.
    pub fn record_failure(&mut self, category: Category, error: &CommandError) {
        self.snapshot.category_errors.push(CategoryFailure {
            category,
            message: error.to_string(),
        });
    }

    pub fn build(mut self) -> Snapshot {
        // Radio modes refine the listed interfaces. Without an interface list
        // the radio table is the only record of the wireless ports.
        for row in std::mem::take(&mut self.wireless) {
            match self.snapshot.interfaces.iter_mut().find(|i| i.name == row.name) {
                Some(iface) => {
                    if iface.kind == InterfaceKind::Other {
                        iface.kind = InterfaceKind::Wireless;
                    }
                    iface.wireless_role = Some(row.role());
                }
                None if !self.interfaces_listed => {
                    if self.interface_names.insert(row.name.clone()) {
                        self.snapshot.interfaces.push(row.into_interface());
                    }
                }
                None => debug!(
                    "{}: wireless settings for unlisted interface {}",
                    self.snapshot.identity, row.name
                ),
            }
        }
        self.snapshot
    }

    fn decode_all<R, T, F>(&mut self, category: Category, records: &[RawRecord], convert: F) -> Vec<T>
    where
        R: serde::de::DeserializeOwned,
        F: Fn(R) -> Result<T, ValidationError>,
    {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            match record.decode::<R>(category.as_str()).and_then(&convert) {
                Ok(item) => out.push(item),
                Err(e) => self.drop_record(e),
            }
        }
        out
    }

    fn drop_record(&mut self, error: ValidationError) {
        debug!("{}: dropping record: {}", self.snapshot.identity, error);
        self.snapshot.dropped_records += 1;
    }
}
