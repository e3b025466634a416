//! Event handler abstractions.
//!
//! # Responsibilities
//! - Define the callable shape listeners dispatch events into
//! - Define the handler trait that turns symbolic method names into callables
//! - Define opt-in capabilities handlers may expose at bind time
//!
//! # Design Decisions
//! - Callbacks are cheap to clone (`Arc` inside) so a listener can hand one
//!   to each spawned connection task
//! - Method resolution takes `Arc<Self>` so a handler can capture itself in
//!   the returned callback without a second registry lookup
//! - Capabilities are explicit accessor methods defaulting to `None`, not
//!   runtime probing; a handler opts in by overriding the accessor

pub mod container;

pub use container::{HandlerContainer, UnknownHandler};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by event callbacks.
pub type EventFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Context handed to a callback for one event dispatch.
///
/// Fields are optional because different events carry different data: a
/// worker hook knows its worker id, a connection event knows its peer, a
/// receive/packet event carries payload bytes.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    /// Worker index for worker lifecycle events.
    pub worker_id: Option<usize>,

    /// Remote address for connection-scoped events.
    pub peer: Option<SocketAddr>,

    /// Local address of the listener that produced the event.
    pub local: Option<SocketAddr>,

    /// Payload bytes for receive/packet events.
    pub data: Option<Vec<u8>>,
}

impl EventContext {
    pub fn with_worker_id(mut self, worker_id: usize) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn with_local(mut self, local: SocketAddr) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }
}

/// A live event callback, ready to attach to a listener.
#[derive(Clone)]
pub struct EventCallback {
    inner: Arc<dyn Fn(EventContext) -> EventFuture + Send + Sync>,
}

impl EventCallback {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |ctx| Box::pin(f(ctx))),
        }
    }

    /// Dispatch one event through this callback.
    pub async fn invoke(&self, ctx: EventContext) {
        (self.inner)(ctx).await;
    }
}

impl fmt::Debug for EventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventCallback(..)")
    }
}

/// A handler registered in the container under a symbolic name.
///
/// The binder resolves `(handler, method)` pairs from configuration by
/// fetching the handler instance and asking it for the named method.
pub trait EventHandler: Send + Sync {
    /// Produce the callback for `method`, or `None` if this handler does
    /// not expose such a method. Resolution failures are fatal to bootstrap.
    fn resolve_method(self: Arc<Self>, method: &str) -> Option<EventCallback>;

    /// Capability hook: handlers that want to know which server they are
    /// bound to return `Some`.
    fn server_name_aware(&self) -> Option<&dyn ServerNameAware> {
        None
    }

    /// Capability hook: handlers that stage per-server middleware return
    /// `Some`.
    fn middleware_initializer(&self) -> Option<&dyn MiddlewareInitializer> {
        None
    }
}

/// Capability for handlers shared across listeners that still need to know
/// which server each binding belongs to.
pub trait ServerNameAware: Send + Sync {
    fn set_server_name(&self, name: &str);
}

/// Capability for handlers that build a middleware pipeline per server
/// before the first event arrives.
pub trait MiddlewareInitializer: Send + Sync {
    fn init_core_middleware(&self, server_name: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoHandler {
        calls: AtomicUsize,
    }

    impl EventHandler for EchoHandler {
        fn resolve_method(self: Arc<Self>, method: &str) -> Option<EventCallback> {
            match method {
                "on_receive" => {
                    let this = Arc::clone(&self);
                    Some(EventCallback::new(move |_ctx| {
                        let this = Arc::clone(&this);
                        async move {
                            this.calls.fetch_add(1, Ordering::SeqCst);
                        }
                    }))
                }
                _ => None,
            }
        }
    }

    #[tokio::test]
    async fn callback_invokes_captured_handler() {
        let handler = Arc::new(EchoHandler {
            calls: AtomicUsize::new(0),
        });
        let callback = Arc::clone(&handler)
            .resolve_method("on_receive")
            .expect("method should resolve");

        callback.invoke(EventContext::default()).await;
        callback.clone().invoke(EventContext::default()).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_method_resolves_to_none() {
        let handler = Arc::new(EchoHandler {
            calls: AtomicUsize::new(0),
        });
        assert!(Arc::clone(&handler).resolve_method("missing").is_none());
    }

    #[test]
    fn capabilities_default_to_none() {
        let handler = EchoHandler {
            calls: AtomicUsize::new(0),
        };
        assert!(handler.server_name_aware().is_none());
        assert!(handler.middleware_initializer().is_none());
    }

    #[test]
    fn context_builders_chain() {
        let ctx = EventContext::default()
            .with_worker_id(3)
            .with_data(b"ping".to_vec());
        assert_eq!(ctx.worker_id, Some(3));
        assert_eq!(ctx.data.as_deref(), Some(b"ping".as_slice()));
        assert!(ctx.peer.is_none());
    }
}
