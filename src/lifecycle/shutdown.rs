//! Shutdown coordination for engine worker tasks.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Every accept/receive loop the engine spawns subscribes here; `trigger`
/// tells them all to stop taking new work and fall through to their stop
/// hooks.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,

    /// Set once `trigger` has been called, for tasks that start late.
    triggered: AtomicBool,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        tracing::debug!(receivers = self.receiver_count(), "Shutdown requested");
        let _ = self.tx.send(());
    }

    /// True once shutdown has been requested. Tasks spawned after the
    /// broadcast check this instead of waiting for a signal that already
    /// went out.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
