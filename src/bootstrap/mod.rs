//! Server bootstrap subsystem.
//!
//! # Data Flow
//! ```text
//! ServerCollection
//!     → orderer.rs (WebSocket/HTTP definition moved to the front)
//!     → orchestrator.rs, per ordered definition:
//!         no primary yet?  engine creates it → BeforeMainServerStart (once)
//!         primary exists?  add secondary port (refusal is fatal)
//!         → binder.rs attaches merged callbacks, warns on collisions
//!         → settings applied (merged for primary, own-only for secondary)
//!         → registry.rs records name → (kind, handle)
//!         → before_start hook runs synchronously → BeforeServerStart
//!     → start() hands control to the engine until shutdown
//! ```
//!
//! # Design Decisions
//! - Exactly one primary listener per run; its kind fixes the protocol
//!   ceiling for every secondary port attached to it
//! - Lifecycle ordering is contractual: BeforeMainServerStart precedes every
//!   BeforeServerStart, and each definition's before_start hook precedes its
//!   own BeforeServerStart
//! - Collisions on symbolic handler methods are last-write-wins warnings

pub mod binder;
pub mod orchestrator;
pub mod orderer;
pub mod registry;

pub use binder::{CallbackBinder, CallbackCollision};
pub use orchestrator::ServerOrchestrator;
pub use orderer::order_servers;
pub use registry::{RegisteredServer, ServerRegistry};
