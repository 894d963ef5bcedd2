//! One device's fetch pipeline and its retry loop.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::RetryPolicy;
use crate::error::{CollectError, CommandError, ConnectionError};
use crate::model::{CollectionResult, Snapshot, Target};
use crate::session::{CategoryToggles, DeviceConnector, DeviceSession, RawRecord, IDENTITY_PATH};
use crate::snapshot::{resolve_identity, SnapshotBuilder};

/// Run attempts against one target until one succeeds or the policy is spent.
///
/// Connection and identity failures are retried. A panic inside an attempt is
/// terminal: the pipeline reports [`CollectError::Panicked`] without further
/// attempts, and the session that attempt opened is dropped without `close`.
pub(crate) async fn collect_device(
    connector: &dyn DeviceConnector,
    target: &Target,
    retry: &RetryPolicy,
    categories: CategoryToggles,
) -> CollectionResult {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let outcome = AssertUnwindSafe(attempt_once(connector, target, categories))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(CollectError::Panicked(panic_message(panic.as_ref()))));

        match outcome {
            Ok(snapshot) => {
                info!(
                    "Collected {} from {} (attempt {}/{})",
                    snapshot.identity, target.address, attempt, max_attempts
                );
                return CollectionResult::Success {
                    snapshot,
                    attempts: attempt,
                };
            }
            Err(error) if attempt < max_attempts && error.is_retryable() => {
                let delay = retry.delay_before(attempt + 1);
                warn!(
                    "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                    attempt,
                    max_attempts,
                    target.label(),
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                warn!(
                    "Giving up on {} after {} attempt(s): {}",
                    target.label(),
                    attempt,
                    error
                );
                return CollectionResult::Failure {
                    target: target.clone(),
                    error,
                    attempts: attempt,
                };
            }
        }
    }
}

async fn attempt_once(
    connector: &dyn DeviceConnector,
    target: &Target,
    categories: CategoryToggles,
) -> Result<Snapshot, CollectError> {
    let limit = target.timeout;

    let mut session = match timeout(limit, connector.open(target)).await {
        Ok(opened) => opened?,
        Err(_) => {
            return Err(ConnectionError::Timeout {
                address: target.address.clone(),
                after: limit,
            }
            .into());
        }
    };

    let identity = match fetch(session.as_mut(), IDENTITY_PATH, limit).await {
        Ok(records) => resolve_identity(&records, &target.address),
        Err(e) => {
            close(session.as_mut(), limit).await;
            return Err(CollectError::Identity(e));
        }
    };
    debug!("{} identifies as {}", target.address, identity);

    let mut builder = SnapshotBuilder::new(&identity, &target.address);
    for category in categories.enabled() {
        match fetch(session.as_mut(), category.path(), limit).await {
            Ok(records) => builder.ingest(category, &records),
            Err(e) => {
                warn!("{}: {} unavailable: {}", identity, category, e);
                builder.record_failure(category, &e);
            }
        }
    }

    close(session.as_mut(), limit).await;
    Ok(builder.build())
}

async fn fetch(
    session: &mut dyn DeviceSession,
    path: &str,
    limit: Duration,
) -> Result<Vec<RawRecord>, CommandError> {
    match timeout(limit, session.fetch(path)).await {
        Ok(result) => result,
        Err(_) => Err(CommandError::new(
            path,
            format!("timed out after {}s", limit.as_secs_f64()),
        )),
    }
}

async fn close(session: &mut dyn DeviceSession, limit: Duration) {
    if timeout(limit, session.close()).await.is_err() {
        debug!("Session close timed out after {:?}", limit);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "pipeline panicked".to_string()
    }
}
