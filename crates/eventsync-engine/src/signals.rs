//! Process signal handling for the sync daemon.
//!
//! - SIGTERM/SIGINT: stop starting new organizations and exit
//! - SIGHUP: run a sync cycle now instead of waiting for the next tick

use std::sync::Arc;

use tokio::sync::{Notify, watch};
use tracing::{debug, error, info};

/// Owns the shutdown channel and the sync-now notifier.
pub struct SignalHandler {
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    sync_now: Arc<Notify>,
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHandler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            sync_now: Arc::new(Notify::new()),
        }
    }

    /// Spawns the signal listener task. Call once, from inside a runtime.
    #[cfg(unix)]
    pub fn spawn_listener(&self) {
        let shutdown_tx = self.shutdown_tx.clone();
        let sync_now = self.sync_now.clone();

        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};

            let (mut sigterm, mut sigint, mut sighup) = match (
                signal(SignalKind::terminate()),
                signal(SignalKind::interrupt()),
                signal(SignalKind::hangup()),
            ) {
                (Ok(term), Ok(int), Ok(hup)) => (term, int, hup),
                (term, int, hup) => {
                    let err = [term.err(), int.err(), hup.err()].into_iter().flatten().next();
                    error!(error = ?err, "Failed to install signal handlers, falling back to Ctrl+C");
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Received Ctrl+C, initiating shutdown");
                        let _ = shutdown_tx.send(true);
                    }
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, initiating shutdown");
                        let _ = shutdown_tx.send(true);
                        break;
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT, initiating shutdown");
                        let _ = shutdown_tx.send(true);
                        break;
                    }
                    _ = sighup.recv() => {
                        info!("Received SIGHUP, requesting an immediate sync");
                        sync_now.notify_one();
                    }
                }
            }

            debug!("Signal listener stopped");
        });
    }

    /// Ctrl+C only.
    #[cfg(not(unix))]
    pub fn spawn_listener(&self) {
        let shutdown_tx = self.shutdown_tx.clone();

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received Ctrl+C, initiating shutdown");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    /// Returns a future that completes when shutdown is signaled.
    pub fn shutdown(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.shutdown_rx.clone(),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Notifier fired on SIGHUP. At most one request is buffered.
    pub fn sync_requests(&self) -> Arc<Notify> {
        self.sync_now.clone()
    }

    /// Creates a shutdown handle that can be passed to other components.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
            rx: self.shutdown_rx.clone(),
        }
    }
}

/// Completes when shutdown is signaled.
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for shutdown. Also returns if every sender is gone.
    pub async fn wait(mut self) {
        // wait_for checks the current value before awaiting a change.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// A cloneable handle for triggering or checking shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Returns a future that completes when shutdown is triggered.
    pub fn wait(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.rx.clone(),
        }
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_shutdown_is_visible_everywhere() {
        let handler = SignalHandler::new();
        let handle = handler.shutdown_handle();
        assert!(!handler.is_shutdown());
        assert!(!handle.is_shutdown());

        handle.trigger();

        assert!(handler.is_shutdown());
        assert!(handle.is_shutdown());
    }

    #[tokio::test]
    async fn shutdown_signal_completes_after_trigger() {
        let handler = SignalHandler::new();
        let shutdown = handler.shutdown();
        let handle = handler.shutdown_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.trigger();
        });

        let result = tokio::time::timeout(Duration::from_millis(200), shutdown.wait()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_stopped() {
        let handler = SignalHandler::new();
        handler.trigger_shutdown();
        let result =
            tokio::time::timeout(Duration::from_millis(50), handler.shutdown_handle().wait().wait())
                .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn sync_request_is_buffered() {
        let handler = SignalHandler::new();
        let requests = handler.sync_requests();
        requests.notify_one();

        let result = tokio::time::timeout(Duration::from_millis(50), requests.notified()).await;
        assert!(result.is_ok());
    }
}
