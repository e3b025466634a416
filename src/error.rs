//! Bootstrap error taxonomy.
//!
//! Every variant here is fatal: bootstrap either wires the whole server set
//! up or returns an error and the process does not start serving. Callback
//! collisions are deliberately absent, they are warnings carried by
//! [`CallbackCollision`](crate::bootstrap::CallbackCollision).

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("failed to create listener for server '{server}' on {address}: {source}")]
    ListenerCreation {
        server: String,
        address: String,
        #[source]
        source: EngineError,
    },

    #[error("failed to resolve handler '{handler}::{method}' for server '{server}'")]
    HandlerResolution {
        server: String,
        handler: String,
        method: String,
    },

    #[error("orchestrator has already been initialized")]
    AlreadyInitialized,

    #[error("orchestrator has no initialized main server")]
    Uninitialized,

    #[error(transparent)]
    Engine(#[from] EngineError),
}
