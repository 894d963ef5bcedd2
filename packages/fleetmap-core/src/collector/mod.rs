//! Concurrent collection orchestrator.
//!
//! Fans out one pipeline per target, bounded by a semaphore, and gathers
//! exactly one [`CollectionResult`] per target over a channel. Pipelines
//! retry independently; a failing or hung device never holds up the others
//! beyond its own timeout.

mod pipeline;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::error::CollectError;
use crate::model::{CollectionResult, Target};
use crate::session::{CategoryToggles, DeviceConnector};

/// Default number of devices polled at once
pub const DEFAULT_MAX_WORKERS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per device, including the first
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
    /// Upper bound for exponential delays
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(2),
            backoff: Backoff::Fixed,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Sleep before attempt number `attempt` (the first retry is attempt 2).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32
                    .checked_pow(attempt.saturating_sub(2))
                    .unwrap_or(u32::MAX);
                self.delay.saturating_mul(factor).min(self.max_delay)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectOptions {
    pub max_workers: usize,
    pub retry: RetryPolicy,
    pub categories: CategoryToggles,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            retry: RetryPolicy::default(),
            categories: CategoryToggles::default(),
        }
    }
}

/// Poll every target and return one result per target, in target order.
pub async fn collect(
    connector: Arc<dyn DeviceConnector>,
    targets: &[Target],
    options: &CollectOptions,
) -> Vec<CollectionResult> {
    if targets.is_empty() {
        return Vec::new();
    }

    let workers = options.max_workers.max(1);
    info!(
        "Collecting from {} device(s) with up to {} worker(s)",
        targets.len(),
        workers
    );

    let semaphore = Arc::new(Semaphore::new(workers));
    let (tx, mut rx) = mpsc::channel::<(usize, CollectionResult)>(targets.len());

    for (index, target) in targets.iter().cloned().enumerate() {
        let tx = tx.clone();
        let connector = Arc::clone(&connector);
        let semaphore = Arc::clone(&semaphore);
        let retry = options.retry.clone();
        let categories = options.categories;

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let result =
                pipeline::collect_device(connector.as_ref(), &target, &retry, categories).await;
            let _ = tx.send((index, result)).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<CollectionResult>> = vec![None; targets.len()];
    while let Some((index, result)) = rx.recv().await {
        slots[index] = Some(result);
    }

    let results: Vec<CollectionResult> = slots
        .into_iter()
        .zip(targets)
        .map(|(slot, target)| {
            slot.unwrap_or_else(|| {
                warn!("Collector task for {} exited without a result", target.label());
                CollectionResult::Failure {
                    target: target.clone(),
                    error: CollectError::Panicked("task exited without a result".to_string()),
                    attempts: 0,
                }
            })
        })
        .collect();

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    info!(
        "Collection finished: {} succeeded, {} failed",
        succeeded,
        results.len() - succeeded
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CommandError, ConnectionError};
    use crate::session::{Category, DeviceSession, RawRecord, IDENTITY_PATH};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Script {
        /// Number of opens that fail before one succeeds
        failing_opens: u32,
        hang: bool,
        panic: bool,
        records: HashMap<String, Vec<RawRecord>>,
    }

    impl Script {
        fn device(identity: &str) -> Self {
            let mut records = HashMap::new();
            records.insert(
                IDENTITY_PATH.to_string(),
                vec![RawRecord::new().with("name", identity)],
            );
            records.insert(
                "/interface".to_string(),
                vec![RawRecord::new().with("name", "ether1").with("type", "ether")],
            );
            Self {
                records,
                ..Self::default()
            }
        }

        fn failing(mut self, opens: u32) -> Self {
            self.failing_opens = opens;
            self
        }
    }

    #[derive(Default)]
    struct ScriptedConnector {
        scripts: HashMap<String, Script>,
        opens: Mutex<HashMap<String, u32>>,
        fetched: Arc<Mutex<Vec<String>>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedConnector {
        fn with(mut self, address: &str, script: Script) -> Self {
            self.scripts.insert(address.to_string(), script);
            self
        }

        fn opens(&self, address: &str) -> u32 {
            self.opens.lock().unwrap().get(address).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl DeviceConnector for ScriptedConnector {
        async fn open(&self, target: &Target) -> Result<Box<dyn DeviceSession>, ConnectionError> {
            let count = {
                let mut opens = self.opens.lock().unwrap();
                let entry = opens.entry(target.address.clone()).or_insert(0);
                *entry += 1;
                *entry
            };
            let unreachable = ConnectionError::Unreachable {
                address: target.address.clone(),
                reason: "scripted".to_string(),
            };
            let script = self.scripts.get(&target.address).cloned().ok_or(unreachable.clone())?;

            if script.panic {
                panic!("scripted panic for {}", target.address);
            }
            if script.hang {
                std::future::pending::<()>().await;
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if count <= script.failing_opens {
                return Err(unreachable);
            }
            Ok(Box::new(ScriptedSession {
                records: script.records,
                fetched: Arc::clone(&self.fetched),
            }))
        }
    }

    struct ScriptedSession {
        records: HashMap<String, Vec<RawRecord>>,
        fetched: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DeviceSession for ScriptedSession {
        async fn fetch(&mut self, path: &str) -> Result<Vec<RawRecord>, CommandError> {
            self.fetched.lock().unwrap().push(path.to_string());
            self.records
                .get(path)
                .cloned()
                .ok_or_else(|| CommandError::new(path, "no such command"))
        }
    }

    fn options(max_attempts: u32) -> CollectOptions {
        CollectOptions {
            max_workers: 2,
            retry: RetryPolicy {
                max_attempts,
                delay: Duration::from_secs(1),
                ..RetryPolicy::default()
            },
            categories: CategoryToggles::default(),
        }
    }

    fn targets(addresses: &[&str]) -> Vec<Target> {
        addresses
            .iter()
            .map(|a| Target::new(a).with_timeout(Duration::from_secs(5)))
            .collect()
    }

    #[test]
    fn test_retry_delay_backoff() {
        let fixed = RetryPolicy::default();
        assert_eq!(fixed.delay_before(2), Duration::from_secs(2));
        assert_eq!(fixed.delay_before(5), Duration::from_secs(2));

        let exp = RetryPolicy {
            backoff: Backoff::Exponential,
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert_eq!(exp.delay_before(2), Duration::from_secs(2));
        assert_eq!(exp.delay_before(3), Duration::from_secs(4));
        assert_eq!(exp.delay_before(4), Duration::from_secs(8));
        assert_eq!(exp.delay_before(5), Duration::from_secs(10));
        assert_eq!(exp.delay_before(40), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_one_result_per_target_in_order() {
        let connector = ScriptedConnector::default()
            .with("10.0.0.1", Script::device("R1"))
            .with("10.0.0.2", Script::device("R2"))
            .with("10.0.0.4", Script::device("R4"))
            .with("10.0.0.5", Script::device("R5"));
        let targets = targets(&["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"]);

        let results = collect(Arc::new(connector), &targets, &options(2)).await;

        assert_eq!(results.len(), targets.len());
        assert_eq!(results[0].snapshot().unwrap().identity, "R1");
        assert_eq!(results[1].snapshot().unwrap().identity, "R2");
        assert!(!results[2].is_success());
        assert_eq!(results[2].attempts(), 2);
        assert_eq!(results[3].snapshot().unwrap().identity, "R4");
        assert_eq!(results[4].snapshot().unwrap().identity, "R5");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_attempt_counts() {
        let connector = Arc::new(
            ScriptedConnector::default()
                .with("T1", Script::device("T1"))
                .with("T2", Script::device("T2").failing(1))
                .with("T3", Script::device("T3").failing(u32::MAX)),
        );
        let targets = targets(&["T1", "T2", "T3"]);

        let results = collect(connector.clone(), &targets, &options(2)).await;

        assert!(matches!(results[0], CollectionResult::Success { attempts: 1, .. }));
        assert!(matches!(results[1], CollectionResult::Success { attempts: 2, .. }));
        match &results[2] {
            CollectionResult::Failure { target, error, attempts } => {
                assert_eq!(target.address, "T3");
                assert_eq!(*attempts, 2);
                assert!(matches!(error, CollectError::Connection(ConnectionError::Unreachable { .. })));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(connector.opens("T3"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_device_times_out_without_blocking_others() {
        let mut hung = Script::device("H");
        hung.hang = true;
        let connector = ScriptedConnector::default()
            .with("10.0.0.1", Script::device("R1"))
            .with("10.0.0.9", hung)
            .with("10.0.0.2", Script::device("R2"));
        let targets = targets(&["10.0.0.1", "10.0.0.9", "10.0.0.2"]);

        let results = collect(Arc::new(connector), &targets, &options(1)).await;

        assert!(results[0].is_success());
        assert!(results[2].is_success());
        assert!(matches!(
            results[1].error(),
            Some(CollectError::Connection(ConnectionError::Timeout { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_pipeline_becomes_failure() {
        let mut broken = Script::device("B");
        broken.panic = true;
        let connector = ScriptedConnector::default()
            .with("10.0.0.1", Script::device("R1"))
            .with("10.0.0.6", broken);
        let connector = Arc::new(connector);
        let targets = targets(&["10.0.0.1", "10.0.0.6"]);

        let results = collect(connector.clone(), &targets, &options(3)).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_success());
        match results[1].error() {
            Some(CollectError::Panicked(message)) => assert!(message.contains("scripted panic")),
            other => panic!("expected panic failure, got {:?}", other),
        }
        assert_eq!(results[1].attempts(), 1);
        // panics are terminal, never retried
        assert_eq!(connector.opens.lock().unwrap()["10.0.0.6"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bounded_by_max_workers() {
        let mut connector = ScriptedConnector::default();
        let addresses: Vec<String> = (1..=6).map(|i| format!("10.0.1.{}", i)).collect();
        for address in &addresses {
            connector = connector.with(address, Script::device(address));
        }
        let connector = Arc::new(connector);
        let refs: Vec<&str> = addresses.iter().map(String::as_str).collect();

        let results = collect(connector.clone(), &targets(&refs), &options(1)).await;

        assert!(results.iter().all(CollectionResult::is_success));
        assert!(connector.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_category_failure_does_not_fail_device() {
        let connector = Arc::new(ScriptedConnector::default().with("10.0.0.1", Script::device("R1")));

        let results = collect(connector, &targets(&["10.0.0.1"]), &options(1)).await;

        let snapshot = results[0].snapshot().unwrap();
        assert_eq!(snapshot.interfaces.len(), 1);
        assert!(snapshot
            .category_errors
            .iter()
            .any(|f| f.category == Category::Neighbors));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_categories_are_not_fetched() {
        let connector = Arc::new(ScriptedConnector::default().with("10.0.0.1", Script::device("R1")));
        let mut opts = options(1);
        opts.categories = CategoryToggles {
            system_info: false,
            ip_addresses: false,
            neighbors: false,
            pppoe_active: false,
            pppoe_secrets: false,
            wireless: false,
            interfaces: true,
        };

        let results = collect(connector.clone(), &targets(&["10.0.0.1"]), &opts).await;

        let fetched = connector.fetched.lock().unwrap().clone();
        assert_eq!(fetched, vec![IDENTITY_PATH.to_string(), "/interface".to_string()]);
        assert!(results[0].snapshot().unwrap().category_errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_failure_fails_attempt() {
        let mut script = Script::device("R1");
        script.records.remove(IDENTITY_PATH);
        let connector = Arc::new(ScriptedConnector::default().with("10.0.0.1", script));

        let results = collect(connector, &targets(&["10.0.0.1"]), &options(2)).await;

        assert!(matches!(results[0].error(), Some(CollectError::Identity(_))));
        assert_eq!(results[0].attempts(), 2);
    }

    #[tokio::test]
    async fn test_collect_no_targets() {
        let results = collect(Arc::new(ScriptedConnector::default()), &[], &options(1)).await;
        assert!(results.is_empty());
    }
}
