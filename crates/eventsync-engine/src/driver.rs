//! One sync run over a set of organizations.
//!
//! Each organization goes through fetch, reconcile and prune on its own.
//! Organizations run concurrently up to [`DriverConfig::max_concurrency`];
//! a failure in one never aborts the others.

use std::sync::Arc;
use std::time::Instant;

use eventsync_core::Event;
use eventsync_importers::{ImporterOptions, ImporterRegistry};
use eventsync_store::{EventStore, StoreResult};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, Span, info, info_span, warn};

use crate::error::EngineResult;
use crate::prune::{PruneReport, Pruner};
use crate::reconcile::{Reconciler, SyncReport};
use crate::signals::ShutdownHandle;

/// Default number of organizations synced at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// One configured source feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub name: String,
    pub url: String,
    pub importer: String,
    #[serde(default)]
    pub options: ImporterOptions,
}

impl OrganizationConfig {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        importer: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            importer: importer.into(),
            options: ImporterOptions::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub max_concurrency: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// How one organization's cycle ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrganizationOutcome {
    Synced {
        fetched: usize,
        sync: SyncReport,
        prune: PruneReport,
    },
    /// The feed could not be fetched or decoded; nothing was written.
    FetchFailed {
        code: String,
        error: String,
        retryable: bool,
    },
    /// The store failed while reconciling or pruning.
    Failed { error: String, retryable: bool },
    /// Shutdown was requested before the organization started.
    Cancelled,
}

impl OrganizationOutcome {
    /// True when the cycle failed as a whole or some events or rows failed.
    pub fn has_failures(&self) -> bool {
        match self {
            Self::Synced { sync, prune, .. } => {
                !sync.failures.is_empty() || !prune.failures.is_empty()
            }
            Self::FetchFailed { .. } | Self::Failed { .. } => true,
            Self::Cancelled => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationRun {
    pub organization: String,
    pub importer: String,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub outcome: OrganizationOutcome,
}

/// Outcomes of one run, in configuration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub organizations: Vec<OrganizationRun>,
}

impl RunReport {
    pub fn get(&self, organization: &str) -> Option<&OrganizationOutcome> {
        self.organizations
            .iter()
            .find(|run| run.organization == organization)
            .map(|run| &run.outcome)
    }

    pub fn failed_count(&self) -> usize {
        self.organizations
            .iter()
            .filter(|run| run.outcome.has_failures())
            .count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.organizations
            .iter()
            .filter(|run| matches!(run.outcome, OrganizationOutcome::Cancelled))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Total rows inserted or updated across organizations.
    pub fn writes(&self) -> usize {
        self.organizations
            .iter()
            .map(|run| match &run.outcome {
                OrganizationOutcome::Synced { sync, .. } => sync.writes(),
                _ => 0,
            })
            .sum()
    }

    /// One line per failing organization, for logs and exit messages.
    pub fn failure_summary(&self) -> Option<String> {
        let lines: Vec<String> = self
            .organizations
            .iter()
            .filter_map(|run| match &run.outcome {
                OrganizationOutcome::FetchFailed { error, .. }
                | OrganizationOutcome::Failed { error, .. } => {
                    Some(format!("{}: {error}", run.organization))
                }
                OrganizationOutcome::Synced { sync, prune, .. } if run.outcome.has_failures() => {
                    Some(format!(
                        "{}: {} event(s) failed to reconcile, {} row(s) failed to prune",
                        run.organization,
                        sync.failures.len(),
                        prune.failures.len()
                    ))
                }
                _ => None,
            })
            .collect();
        (!lines.is_empty()).then(|| lines.join("; "))
    }
}

/// Runs fetch, reconcile and prune for each organization.
pub struct SyncDriver {
    registry: Arc<ImporterRegistry>,
    store: Arc<dyn EventStore>,
    config: DriverConfig,
    shutdown: Option<ShutdownHandle>,
}

impl SyncDriver {
    pub fn new(registry: Arc<ImporterRegistry>, store: Arc<dyn EventStore>) -> Self {
        Self {
            registry,
            store,
            config: DriverConfig::default(),
            shutdown: None,
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Organizations not yet started when shutdown fires are reported as
    /// [`OrganizationOutcome::Cancelled`].
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Syncs every organization and returns their outcomes in input order.
    pub async fn run(&self, organizations: &[OrganizationConfig]) -> RunReport {
        let started = Instant::now();
        let concurrency = self.config.max_concurrency.max(1);
        info!(
            organizations = organizations.len(),
            concurrency, "Starting sync run"
        );

        let mut runs: Vec<(usize, OrganizationRun)> =
            stream::iter(organizations.iter().cloned().enumerate())
                .map(|(index, organization)| async move {
                    (index, self.run_one(&organization).await)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;
        runs.sort_by_key(|(index, _)| *index);

        let report = RunReport {
            organizations: runs.into_iter().map(|(_, run)| run).collect(),
        };
        info!(
            failed = report.failed_count(),
            cancelled = report.cancelled_count(),
            writes = report.writes(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sync run finished"
        );
        report
    }

    async fn run_one(&self, organization: &OrganizationConfig) -> OrganizationRun {
        let started = Instant::now();
        let span = info_span!(
            "organization",
            name = %organization.name,
            importer = %organization.importer
        );
        let outcome = self.sync_organization(organization).instrument(span).await;

        OrganizationRun {
            organization: organization.name.clone(),
            importer: organization.importer.clone(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            outcome,
        }
    }

    /// Runs one organization's cycle.
    pub async fn sync_organization(&self, organization: &OrganizationConfig) -> OrganizationOutcome {
        if self.shutdown.as_ref().is_some_and(ShutdownHandle::is_shutdown) {
            info!("Shutdown requested, skipping organization");
            return OrganizationOutcome::Cancelled;
        }

        info!(url = %organization.url, "Fetching events");
        let events = match self
            .registry
            .import(
                &organization.importer,
                &organization.url,
                &organization.name,
                &organization.options,
            )
            .await
        {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, retryable = err.is_retryable(), "Fetch failed");
                return OrganizationOutcome::FetchFailed {
                    code: err.code().as_str().to_string(),
                    error: err.to_string(),
                    retryable: err.is_retryable(),
                };
            }
        };
        let fetched = events.len();
        info!(count = fetched, "Fetched events");

        match self.reconcile(organization.name.clone(), events).await {
            Ok((sync, prune)) => {
                info!(
                    inserted = sync.inserted,
                    updated = sync.updated,
                    unchanged = sync.unchanged,
                    stale = sync.stale,
                    rejection_resets = sync.rejection_resets,
                    pruned = prune.deleted_count(),
                    failures = sync.failures.len() + prune.failures.len(),
                    "Organization synced"
                );
                OrganizationOutcome::Synced {
                    fetched,
                    sync,
                    prune,
                }
            }
            Err(err) => {
                warn!(error = %err, "Organization sync failed");
                OrganizationOutcome::Failed {
                    retryable: err.is_retryable(),
                    error: err.to_string(),
                }
            }
        }
    }

    /// Reconciles then prunes on the blocking pool.
    async fn reconcile(
        &self,
        organization: String,
        events: Vec<Event>,
    ) -> EngineResult<(SyncReport, PruneReport)> {
        let store = self.store.clone();
        let span = Span::current();

        let reports = tokio::task::spawn_blocking(move || -> StoreResult<_> {
            let _entered = span.enter();
            let sync = Reconciler::new(store.clone()).sync(&organization, &events);
            let prune = Pruner::new(store).prune(&organization, &events)?;
            Ok((sync, prune))
        })
        .await??;

        Ok(reports)
    }
}

impl std::fmt::Debug for SyncDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDriver")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}
