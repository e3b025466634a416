//! Listener engine abstraction.
//!
//! # Data Flow
//! ```text
//! ServerOrchestrator
//!     → ServerEngine::create_listener(spec)       (primary, once per run)
//!     → MainServer::add_listener(host, port, ..)  (per secondary server)
//!     → ListenerControl::bind_event / apply_settings
//!     → MainServer::serve                          (blocks until shutdown)
//! ```
//!
//! # Design Decisions
//! - Traits stay object-safe (via async_trait) so the orchestrator never
//!   names a concrete engine; tests substitute mocks at this seam
//! - Listeners bind their sockets eagerly at creation, so port conflicts
//!   surface during bootstrap instead of after `serve` takes over
//! - `serve` consumes the main server; bootstrap cannot reach it afterwards

pub mod net;

pub use net::TokioEngine;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::schema::{RunMode, ServerKind, Settings, SocketKind};
use crate::event::ServerEvent;
use crate::handler::EventCallback;

/// Everything an engine needs to create one primary listener.
#[derive(Debug, Clone)]
pub struct ListenerSpec {
    pub kind: ServerKind,
    pub host: String,
    pub port: u16,
    pub mode: RunMode,
    pub socket: SocketKind,
}

impl ListenerSpec {
    /// Log-friendly rendering of the listen address.
    pub fn address(&self) -> String {
        format_address(&self.host, self.port, self.socket)
    }
}

/// Engine failures during listener creation or serving.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid listen address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("unsupported by this engine: {what}")]
    Unsupported { what: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Handle to one bound listener, primary or secondary.
pub trait ListenerControl: Send + Sync {
    /// Attach a callback for an event. Binding the same event again
    /// replaces the earlier callback.
    fn bind_event(&self, event: ServerEvent, callback: EventCallback);

    /// Apply engine options. Unrecognized options are logged and skipped,
    /// never fatal.
    fn apply_settings(&self, settings: &Settings);

    /// The address actually bound, when the transport has one. Useful when
    /// the configuration asked for port 0.
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// The primary listener: owns the run loop and accepts secondary ports.
#[async_trait]
pub trait MainServer: Send {
    /// Control handle for the primary listener itself.
    fn handle(&self) -> Arc<dyn ListenerControl>;

    /// Attach an additional listening port sharing this server's run loop.
    async fn add_listener(
        &mut self,
        host: &str,
        port: u16,
        socket: SocketKind,
    ) -> Result<Arc<dyn ListenerControl>, EngineError>;

    /// Run until shutdown, dispatching bound callbacks as events occur.
    async fn serve(self: Box<Self>) -> Result<(), EngineError>;
}

/// Factory the orchestrator uses to create the primary listener.
#[async_trait]
pub trait ServerEngine: Send + Sync {
    async fn create_listener(
        &self,
        spec: ListenerSpec,
    ) -> Result<Box<dyn MainServer>, EngineError>;
}

/// Render a host/port/socket triple as a display address. Unix sockets
/// carry their path in `host` and have no port.
pub fn format_address(host: &str, port: u16, socket: SocketKind) -> String {
    if socket == SocketKind::Unix {
        return host.to_string();
    }
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
