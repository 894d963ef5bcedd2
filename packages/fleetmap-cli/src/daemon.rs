//! Daemon mode for periodic collection
//!
//! This module implements a long-running service that:
//! - Collects from the fleet on a fixed interval
//! - Overwrites the JSON report after each run
//! - Handles graceful shutdown via SIGTERM/SIGINT

use anyhow::Result;
use fleetmap_core::LoadedConfig;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::report;

/// Run collections every `interval_minutes` until interrupted
pub async fn run_daemon(loaded: LoadedConfig, interval_minutes: u64, output: Option<PathBuf>) -> Result<()> {
    // Fail early on a missing source instead of on the first tick
    crate::connector_for(&loaded)?;
    let interval_minutes = interval_minutes.max(1);

    tracing::info!(
        "Starting daemon: collecting from {} device(s) every {} minutes",
        loaded.config.targets.len(),
        interval_minutes
    );
    if output.is_none() {
        tracing::info!("No --output given; results are only logged");
    }

    // Set up signal handlers
    let shutdown = Arc::new(Notify::new());
    setup_signal_handlers(shutdown.clone());

    // Run initial collection immediately
    tracing::info!("Running initial collection...");
    if let Err(e) = run_and_report(&loaded, output.as_ref()).await {
        tracing::error!("Initial collection failed: {:#}", e);
    }
    log_next_run(interval_minutes);

    let period = Duration::from_secs(interval_minutes * 60);
    let (loaded, output) = (&loaded, output.as_ref());
    run_until_shutdown(period, &shutdown, move || async move {
        if let Err(e) = run_and_report(loaded, output).await {
            tracing::error!("Collection failed: {:#}", e);
        }
        log_next_run(interval_minutes);
    })
    .await;

    tracing::info!("Daemon stopped");
    Ok(())
}

/// Call `run` once per `period` until a shutdown signal arrives.
///
/// The first tick is skipped; the caller has just run.
async fn run_until_shutdown<F, Fut>(period: Duration, shutdown: &Notify, mut run: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => run().await,
            _ = shutdown.notified() => {
                tracing::info!("Shutdown requested, stopping daemon");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }
}

fn log_next_run(interval_minutes: u64) {
    let next = chrono::Local::now() + chrono::Duration::minutes(interval_minutes as i64);
    tracing::debug!("Next collection at {}", next.format("%H:%M:%S"));
}

/// Set up SIGTERM and SIGINT handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<Notify>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, name) in [
            (SignalKind::terminate(), "SIGTERM"),
            (SignalKind::interrupt(), "SIGINT"),
        ] {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut stream = match signal(kind) {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::warn!("Failed to register {} handler: {}", name, e);
                        return;
                    }
                };
                stream.recv().await;
                tracing::info!("Received {}", name);
                // Stores a permit if the loop is mid-collection
                shutdown.notify_one();
            });
        }
    }

    #[cfg(not(unix))]
    {
        // On non-Unix platforms, rely on tokio::signal::ctrl_c() in the main loop
        let _ = shutdown;
    }
}

/// Run one collection and refresh the report
async fn run_and_report(loaded: &LoadedConfig, output: Option<&PathBuf>) -> Result<()> {
    let start = std::time::Instant::now();
    let inventory = crate::collect_once(loaded).await?;

    tracing::info!(
        "Collection complete: {}/{} devices, {} links, {} anomalies in {:.1}s",
        inventory.stats.collected_devices,
        inventory.stats.total_devices,
        inventory.stats.total_links,
        inventory.stats.total_anomalies,
        start.elapsed().as_secs_f64()
    );

    if let Some(path) = output {
        report::write_report(path, &inventory)?;
        tracing::debug!("Report written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_the_wait() {
        let shutdown = Arc::new(Notify::new());
        let runs = AtomicUsize::new(0);
        let counter = &runs;

        let notifier = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            notifier.notify_one();
        });

        let start = tokio::time::Instant::now();
        run_until_shutdown(Duration::from_secs(15 * 60), &shutdown, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(start.elapsed() < Duration::from_secs(15 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_during_a_run_is_not_lost() {
        let shutdown = Notify::new();
        let runs = AtomicUsize::new(0);
        let (counter, signal) = (&runs, &shutdown);

        run_until_shutdown(Duration::from_secs(60), &shutdown, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            // arrives while nothing is waiting on the notify
            signal.notify_one();
        })
        .await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
