//! `eventsync daemon`: periodic sync in the foreground.
//!
//! - SIGTERM/SIGINT: finish the organizations already running, then exit
//! - SIGHUP: run a sync now

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eventsync_engine::{DriverConfig, Scheduler, SchedulerConfig, SignalHandler, SyncDriver};
use tracing::{info, warn};

use crate::commands::{build_registry, open_store};
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// Runs until a shutdown signal arrives.
pub async fn run(config: &AppConfig, database: &Path, interval: Option<u64>) -> CliResult<()> {
    let organizations = Arc::new(config.organizations(None)?);
    if organizations.is_empty() {
        return Err(CliError::Config(format!(
            "no organizations configured; add some to {}",
            AppConfig::default_path().display()
        )));
    }

    let registry = Arc::new(build_registry(config)?);
    let store = open_store(database)?;

    let signals = SignalHandler::new();
    signals.spawn_listener();

    let driver = Arc::new(
        SyncDriver::new(registry, store)
            .with_config(DriverConfig {
                max_concurrency: config.max_concurrency,
            })
            .with_shutdown(signals.shutdown_handle()),
    );

    let interval = interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.interval());
    let scheduler =
        Scheduler::new(SchedulerConfig::new(interval)).with_shutdown(signals.shutdown_handle());
    let handle = scheduler.handle();

    info!(
        organizations = organizations.len(),
        interval_secs = interval.as_secs(),
        database = %database.display(),
        "Starting daemon"
    );

    let scheduler_task = tokio::spawn(scheduler.run(move || {
        let driver = driver.clone();
        let organizations = organizations.clone();
        async move { driver.run(&organizations).await }
    }));

    let sync_requests = signals.sync_requests();
    let shutdown = signals.shutdown_handle();
    loop {
        tokio::select! {
            _ = sync_requests.notified() => {
                if let Err(e) = handle.sync_now().await {
                    warn!(error = %e, "Scheduler is gone, stopping");
                    break;
                }
            }
            _ = shutdown.wait().wait() => break,
        }
    }

    info!("Shutting down...");
    if let Err(e) = handle.stop().await {
        warn!(error = %e, "Failed to send stop command to scheduler");
    }
    // Lets an in-flight run finish its current organizations.
    if tokio::time::timeout(Duration::from_secs(30), scheduler_task)
        .await
        .is_err()
    {
        warn!("Scheduler did not stop in time");
    }

    if let Some(error) = handle.state().await.last_error {
        warn!(error = %error, "Last run had failures");
    }
    info!("Daemon stopped");
    Ok(())
}
