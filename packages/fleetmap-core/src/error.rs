//! Error taxonomy for device collection.
//!
//! Only [`CollectError`] ever leaves a pipeline, and only inside a
//! [`CollectionResult::Failure`](crate::model::CollectionResult). Command and
//! validation errors are recovered where they happen.

use serde::Serializer;
use std::time::Duration;
use thiserror::Error;

/// A session to a device could not be established.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConnectionError {
    /// The device did not answer or refused the connection
    #[error("{address} unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    /// The device answered but rejected the login
    #[error("authentication rejected by {address}")]
    Authentication { address: String },

    /// Connecting took longer than the target timeout
    #[error("connection to {address} timed out after {}s", after.as_secs_f64())]
    Timeout { address: String, after: Duration },
}

/// One fetch failed on an otherwise reachable device.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("command {path} failed: {message}")]
pub struct CommandError {
    pub path: String,
    pub message: String,
}

impl CommandError {
    pub fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// A raw record could not be turned into its typed entity.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid {category} record: {reason}")]
pub struct ValidationError {
    pub category: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(category: &'static str, reason: impl Into<String>) -> Self {
        Self {
            category,
            reason: reason.into(),
        }
    }
}

/// Why one collection attempt (or the whole pipeline) failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollectError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The identity fetch is the minimum a pipeline needs to succeed
    #[error("identity fetch failed: {0}")]
    Identity(CommandError),

    /// The pipeline task died before reporting a result
    #[error("collector task aborted: {0}")]
    Panicked(String),
}

impl CollectError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CollectError::Panicked(_))
    }
}

/// Serialize any error through its `Display` form.
pub(crate) fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
