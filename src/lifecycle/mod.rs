//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrap (notifier.rs):
//!     primary listener created → BeforeMainServerStart (exactly once)
//!     per server, callbacks bound → before_start hook → BeforeServerStart
//!     observers (process managers, DI warmup) subscribe via LifecycleBus
//!
//! Shutdown (shutdown.rs):
//!     trigger() → broadcast to engine worker tasks → stop accepting → exit
//! ```
//!
//! # Design Decisions
//! - Notifications are fire-and-forget: bootstrap never waits on observers
//!   and proceeds identically with zero subscribers
//! - The event set is fixed; observers match on the enum, not on names
//! - Shutdown is a broadcast channel so any number of worker tasks can
//!   watch it without coordination

pub mod notifier;
pub mod shutdown;

pub use notifier::{LifecycleBus, LifecycleEvent, LifecycleNotifier};
pub use shutdown::Shutdown;
