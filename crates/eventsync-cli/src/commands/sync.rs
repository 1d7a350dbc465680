//! `eventsync sync`: one pass over the configured organizations.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use eventsync_engine::{DriverConfig, OrganizationOutcome, RunReport, SyncDriver};
use eventsync_store::{EventFilter, EventStore};
use tracing::info;

use crate::commands::{build_registry, open_store};
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// Runs one sync and prints the outcome. Fails if any organization failed.
pub async fn run(
    config: &AppConfig,
    database: &Path,
    organization: Option<&str>,
    json: bool,
) -> CliResult<()> {
    let organizations = config.organizations(organization)?;
    if organizations.is_empty() {
        return Err(CliError::Config(format!(
            "no organizations configured; add some to {}",
            AppConfig::default_path().display()
        )));
    }

    let registry = Arc::new(build_registry(config)?);
    let store = open_store(database)?;
    info!(database = %database.display(), "Opened event store");

    let driver = SyncDriver::new(registry, store.clone()).with_config(DriverConfig {
        max_concurrency: config.max_concurrency,
    });
    let report = driver.run(&organizations).await;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::Config(format!("failed to serialize report: {}", e)))?;
        println!("{}", rendered);
    } else {
        print!("{}", render_report(&report));
        println!("{}", review_summary(store.as_ref())?);
    }

    match report.failure_summary() {
        Some(summary) => Err(CliError::SyncFailed(summary)),
        None => Ok(()),
    }
}

/// One line per organization.
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    for run in &report.organizations {
        let _ = write!(out, "{} ({}): ", run.organization, run.importer);
        match &run.outcome {
            OrganizationOutcome::Synced {
                fetched,
                sync,
                prune,
            } => {
                let _ = write!(
                    out,
                    "{} fetched, {} inserted, {} updated, {} unchanged, {} stale, {} re-review, {} pruned",
                    fetched,
                    sync.inserted,
                    sync.updated,
                    sync.unchanged,
                    sync.stale,
                    sync.rejection_resets,
                    prune.deleted_count()
                );
                let failed = sync.failures.len() + prune.failures.len();
                if failed > 0 {
                    let _ = write!(out, ", {} failed", failed);
                }
            }
            OrganizationOutcome::FetchFailed {
                error, retryable, ..
            } => {
                let _ = write!(out, "fetch failed: {}", error);
                if *retryable {
                    out.push_str(" (retryable)");
                }
            }
            OrganizationOutcome::Failed { error, .. } => {
                let _ = write!(out, "failed: {}", error);
            }
            OrganizationOutcome::Cancelled => out.push_str("cancelled"),
        }
        out.push('\n');
    }
    out
}

/// Counts of upcoming events awaiting review and upcoming rejected ones.
fn review_summary(store: &dyn EventStore) -> CliResult<String> {
    let upcoming = |rejected| EventFilter {
        rejected: Some(rejected),
        ends_after: Some(Utc::now()),
        ..EventFilter::default()
    };
    let pending = store.list(&upcoming(false))?.len();
    let rejected = store.list(&upcoming(true))?.len();
    Ok(format!(
        "upcoming: {} visible, {} rejected",
        pending, rejected
    ))
}
