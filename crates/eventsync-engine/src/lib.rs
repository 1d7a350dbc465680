//! The sync engine: reconcile fetched events, prune vanished ones, and run
//! that per organization on a schedule.

pub mod driver;
pub mod error;
pub mod prune;
pub mod reconcile;
pub mod scheduler;
pub mod signals;

#[cfg(test)]
mod testing;

pub use driver::{
    DEFAULT_MAX_CONCURRENCY, DriverConfig, OrganizationConfig, OrganizationOutcome,
    OrganizationRun, RunReport, SyncDriver,
};
pub use error::{EngineError, EngineResult};
pub use prune::{PruneFailure, PruneReport, Pruner};
pub use reconcile::{EventFailure, Reconciler, SyncReport, UpsertOutcome};
pub use scheduler::{
    DEFAULT_SYNC_INTERVAL, Scheduler, SchedulerCommand, SchedulerConfig, SchedulerHandle,
    SchedulerState,
};
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
