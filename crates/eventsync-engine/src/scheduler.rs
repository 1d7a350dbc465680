//! Periodic sync runs for the daemon.
//!
//! The scheduler calls a run function once at startup and then every
//! interval (plus or minus jitter). It can be told to run now, pause,
//! resume or stop. Failed runs are recorded and never retried early; the
//! next run happens on the normal schedule.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::driver::RunReport;
use crate::signals::ShutdownHandle;

/// Default time between runs.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base interval between runs.
    pub sync_interval: Duration,
    /// Maximum jitter added to or removed from the interval, as a fraction.
    pub jitter_fraction: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            jitter_fraction: 0.1,
        }
    }
}

impl SchedulerConfig {
    pub fn new(sync_interval: Duration) -> Self {
        Self {
            sync_interval,
            ..Default::default()
        }
    }

    /// Builder: set jitter fraction, clamped to `0.0..=1.0`.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Next delay: the interval with jitter applied.
    pub fn next_sync_delay(&self) -> Duration {
        let base = self.sync_interval.as_secs_f64();
        let jitter = rand_jitter(base * self.jitter_fraction);
        Duration::from_secs_f64((base + jitter).max(0.0))
    }
}

/// A value in `[-range, range]` derived from the clock's sub-second nanos.
fn rand_jitter(range: f64) -> f64 {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let fraction = f64::from(nanos) / 1_000_000_000.0;
    (fraction * 2.0 - 1.0) * range
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    SyncNow,
    Pause,
    Resume,
    Stop,
}

/// Bookkeeping about past runs.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub paused: bool,
    /// Runs started since the scheduler began.
    pub runs: u64,
    /// End of the last run in which every organization succeeded.
    pub last_sync: Option<DateTime<Utc>>,
    /// End of the last run, successful or not.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Failure summary of the last run, if it had failures.
    pub last_error: Option<String>,
    /// Organizations that failed in the last run.
    pub last_failed: usize,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished run.
    pub fn record(&mut self, report: &RunReport) {
        let now = Utc::now();
        self.runs += 1;
        self.last_attempt = Some(now);
        self.last_failed = report.failed_count();
        self.last_error = report.failure_summary();
        if report.is_success() {
            self.last_sync = Some(now);
        }
    }
}

pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// Drives periodic runs until stopped or shut down.
pub struct Scheduler {
    config: SchedulerConfig,
    state: SharedSchedulerState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
    shutdown: Option<ShutdownHandle>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            state: Arc::new(RwLock::new(SchedulerState::new())),
            command_tx,
            command_rx,
            shutdown: None,
        }
    }

    /// Stops the loop when shutdown is triggered.
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> SharedSchedulerState {
        self.state.clone()
    }

    /// Runs the scheduler loop with the given run function.
    pub async fn run<F, Fut>(mut self, run_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RunReport> + Send,
    {
        info!(
            interval_secs = self.config.sync_interval.as_secs(),
            "Scheduler started"
        );

        if !self.is_shutdown() {
            self.do_sync(&run_fn).await;
        }

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, scheduler stopping");
                break;
            }

            let delay = self.config.next_sync_delay();
            debug!(delay_secs = delay.as_secs(), "Scheduling next sync");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if self.state.read().await.paused {
                        debug!("Scheduler paused, skipping sync");
                        continue;
                    }
                    self.do_sync(&run_fn).await;
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::SyncNow) => {
                            debug!("Received SyncNow command");
                            self.do_sync(&run_fn).await;
                        }
                        Some(SchedulerCommand::Pause) => {
                            info!("Scheduler paused");
                            self.state.write().await.paused = true;
                        }
                        Some(SchedulerCommand::Resume) => {
                            info!("Scheduler resumed");
                            self.state.write().await.paused = false;
                        }
                        Some(SchedulerCommand::Stop) | None => {
                            info!("Scheduler stopping");
                            break;
                        }
                    }
                }
                _ = wait_for_shutdown(self.shutdown.clone()) => {
                    info!("Shutdown requested, scheduler stopping");
                    break;
                }
            }
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.as_ref().is_some_and(ShutdownHandle::is_shutdown)
    }

    async fn do_sync<F, Fut>(&self, run_fn: &F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RunReport>,
    {
        debug!("Starting scheduled sync");
        let report = run_fn().await;
        if let Some(summary) = report.failure_summary() {
            warn!(failed = report.failed_count(), error = %summary, "Sync run had failures");
        } else {
            info!(writes = report.writes(), "Sync run completed");
        }
        self.state.write().await.record(&report);
    }
}

async fn wait_for_shutdown(shutdown: Option<ShutdownHandle>) {
    match shutdown {
        Some(handle) => handle.wait().wait().await,
        None => std::future::pending().await,
    }
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: SharedSchedulerState,
}

impl SchedulerHandle {
    pub async fn sync_now(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::SyncNow).await
    }

    pub async fn pause(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Resume).await
    }

    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Stop).await
    }

    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }

    pub async fn is_paused(&self) -> bool {
        self.state.read().await.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{OrganizationOutcome, OrganizationRun};
    use crate::signals::SignalHandler;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing_report() -> RunReport {
        RunReport {
            organizations: vec![OrganizationRun {
                organization: "Bike Dallas".into(),
                importer: "ical".into(),
                elapsed_ms: 3,
                outcome: OrganizationOutcome::FetchFailed {
                    code: "http_status".into(),
                    error: "[ical] http_status 503: unavailable".into(),
                    retryable: true,
                },
            }],
        }
    }

    #[test]
    fn next_sync_delay_stays_within_jitter() {
        let config = SchedulerConfig::new(Duration::from_secs(60)).with_jitter(0.1);
        let delay = config.next_sync_delay();
        assert!(delay.as_secs_f64() >= 54.0);
        assert!(delay.as_secs_f64() <= 66.0);
    }

    #[test]
    fn jitter_is_clamped() {
        let config = SchedulerConfig::default().with_jitter(4.0);
        assert_eq!(config.jitter_fraction, 1.0);
    }

    #[test]
    fn state_records_success_and_failure() {
        let mut state = SchedulerState::new();

        state.record(&failing_report());
        assert_eq!(state.runs, 1);
        assert_eq!(state.last_failed, 1);
        assert!(state.last_attempt.is_some());
        assert!(state.last_sync.is_none());
        assert_eq!(
            state.last_error.as_deref(),
            Some("Bike Dallas: [ical] http_status 503: unavailable")
        );

        state.record(&RunReport::default());
        assert_eq!(state.runs, 2);
        assert!(state.last_sync.is_some());
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn scheduler_commands() {
        let scheduler = Scheduler::new(SchedulerConfig::new(Duration::from_secs(60)));
        let handle = scheduler.handle();

        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let task = tokio::spawn(async move {
            scheduler
                .run(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        RunReport::default()
                    }
                })
                .await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        handle.sync_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(handle.state().await.runs, 2);

        handle.pause().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_paused().await);

        handle.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_paused().await);

        handle.stop().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn failed_run_waits_for_the_next_tick() {
        let scheduler = Scheduler::new(SchedulerConfig::new(Duration::from_secs(60)));
        let handle = scheduler.handle();
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let task = tokio::spawn(async move {
            scheduler
                .run(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        failing_report()
                    }
                })
                .await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state().await.last_failed, 1);

        handle.stop().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let signals = SignalHandler::new();
        let scheduler = Scheduler::new(SchedulerConfig::new(Duration::from_secs(60)))
            .with_shutdown(signals.shutdown_handle());

        let task = tokio::spawn(scheduler.run(|| async { RunReport::default() }));
        tokio::time::sleep(Duration::from_millis(20)).await;
        signals.trigger_shutdown();

        let result = tokio::time::timeout(Duration::from_millis(200), task).await;
        assert!(result.is_ok());
    }
}
