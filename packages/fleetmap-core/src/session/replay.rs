//! Serves captured device output from per-device JSON files.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DeviceConnector, DeviceSession, RawRecord};
use crate::error::{CommandError, ConnectionError};
use crate::model::Target;

/// Opens "sessions" by reading `<dir>/<address>.json`.
///
/// Each capture is a JSON object mapping a command path to the array of
/// records the device returned for it:
///
/// ```json
/// { "/system/identity": [{ "name": "R1" }], "/interface": [ ... ] }
/// ```
#[derive(Debug, Clone)]
pub struct ReplayConnector {
    dir: PathBuf,
}

impl ReplayConnector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Capture file for a target. Characters that cannot appear in a file
    /// name (IPv6 colons, path separators) become underscores.
    pub fn capture_path(&self, target: &Target) -> PathBuf {
        let file: String = target
            .address
            .chars()
            .map(|c| match c {
                ':' | '/' | '\\' => '_',
                other => other,
            })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

#[async_trait]
impl DeviceConnector for ReplayConnector {
    async fn open(&self, target: &Target) -> Result<Box<dyn DeviceSession>, ConnectionError> {
        let path = self.capture_path(target);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ConnectionError::Unreachable {
                address: target.address.clone(),
                reason: format!("no capture at {}: {}", path.display(), e),
            }
        })?;

        let commands: HashMap<String, Vec<RawRecord>> =
            serde_json::from_str(&content).map_err(|e| ConnectionError::Unreachable {
                address: target.address.clone(),
                reason: format!("malformed capture {}: {}", path.display(), e),
            })?;

        debug!(
            "Replaying {} command(s) for {} from {}",
            commands.len(),
            target.address,
            path.display()
        );

        Ok(Box::new(ReplaySession { commands }))
    }
}

struct ReplaySession {
    commands: HashMap<String, Vec<RawRecord>>,
}

#[async_trait]
impl DeviceSession for ReplaySession {
    async fn fetch(&mut self, path: &str) -> Result<Vec<RawRecord>, CommandError> {
        self.commands
            .get(path)
            .cloned()
            .ok_or_else(|| CommandError::new(path, "no such command in capture"))
    }
}
