//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerCollection (validated, immutable)
//!     → shared via Arc with the orchestrator and lifecycle observers
//! ```
//!
//! # Design Decisions
//! - A collection is immutable once loaded; topology changes require a restart
//! - Global settings/callbacks are merge layers, not defaults: the orchestrator
//!   combines them with each definition's own entries at bind time
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_str, ConfigError};
pub use schema::{
    layer_callbacks, layer_settings, CallbackMap, HandlerRef, RunMode, ServerCollection,
    ServerDefinition, ServerKind, SettingValue, Settings, SocketKind,
};
pub use validation::{validate, ValidationError};
