//! Multi-listener server bootstrap library.
//!
//! Wires a declarative set of logical servers (HTTP, WebSocket, raw
//! TCP/UDP) onto one engine-owned main listener plus secondary ports,
//! binds their event callbacks, and fires ordered lifecycle notifications
//! before handing control to the engine.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod handler;
pub mod lifecycle;

pub use bootstrap::{CallbackCollision, ServerOrchestrator, ServerRegistry};
pub use config::{
    HandlerRef, RunMode, ServerCollection, ServerDefinition, ServerKind, SettingValue, SocketKind,
};
pub use engine::{ListenerControl, ListenerSpec, MainServer, ServerEngine, TokioEngine};
pub use error::ServerError;
pub use event::ServerEvent;
pub use handler::{
    EventCallback, EventContext, EventHandler, HandlerContainer, MiddlewareInitializer,
    ServerNameAware,
};
pub use lifecycle::{LifecycleBus, LifecycleEvent, LifecycleNotifier, Shutdown};
