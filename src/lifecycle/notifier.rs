//! Bootstrap lifecycle notifications.

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::ServerCollection;
use crate::engine::ListenerControl;

/// Notifications emitted while the orchestrator wires servers up.
///
/// `BeforeMainServerStart` fires at most once per bootstrap run, when the
/// primary listener is first created, and always precedes every
/// `BeforeServerStart`. `BeforeServerStart` fires once per server
/// definition, after its callbacks are bound and its synchronous
/// before-start hook has completed.
#[derive(Clone)]
pub enum LifecycleEvent {
    BeforeMainServerStart {
        /// The freshly created primary listener.
        server: Arc<dyn ListenerControl>,
        /// Snapshot of the full topology being booted.
        config: Arc<ServerCollection>,
    },
    BeforeServerStart {
        /// Name of the server definition that is about to start.
        server: String,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::BeforeMainServerStart { .. } => "before_main_server_start",
            LifecycleEvent::BeforeServerStart { .. } => "before_server_start",
        }
    }
}

impl fmt::Debug for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::BeforeMainServerStart { .. } => {
                f.write_str("BeforeMainServerStart(..)")
            }
            LifecycleEvent::BeforeServerStart { server } => f
                .debug_struct("BeforeServerStart")
                .field("server", server)
                .finish(),
        }
    }
}

/// Sink for lifecycle notifications, injected into the orchestrator.
pub trait LifecycleNotifier: Send + Sync {
    /// Deliver one notification. Fire-and-forget: implementations must not
    /// block bootstrap and have no way to report failure back into it.
    fn notify(&self, event: LifecycleEvent);
}

/// Broadcast-channel notifier for in-process observers.
pub struct LifecycleBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to future notifications. Events emitted before the
    /// subscription are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new(16)
    }
}

impl LifecycleNotifier for LifecycleBus {
    fn notify(&self, event: LifecycleEvent) {
        // Zero subscribers is not an error; bootstrap proceeds regardless.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bus_delivers_to_subscribers() {
        let bus = LifecycleBus::default();
        let mut rx = bus.subscribe();

        bus.notify(LifecycleEvent::BeforeServerStart {
            server: "http".to_string(),
        });

        let event = rx.try_recv().expect("event should be queued");
        assert_eq!(event.name(), "before_server_start");
        match event {
            LifecycleEvent::BeforeServerStart { server } => assert_eq!(server, "http"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn notify_without_subscribers_is_silent() {
        let bus = LifecycleBus::default();
        bus.notify(LifecycleEvent::BeforeServerStart {
            server: "tcp".to_string(),
        });
    }
}
