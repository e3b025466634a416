//! Callback binding with collision tracking.
//!
//! # Responsibilities
//! - Turn configured event-name/handler-reference pairs into live callbacks
//! - Skip event names the registry does not recognize
//! - Warn when two servers claim the same symbolic handler method
//! - Run bind-time capabilities on resolved handler instances
//!
//! # Design Decisions
//! - Collisions are warnings, never errors: some handlers are process-wide
//!   singletons deliberately shared across listeners, and the later binding
//!   wins
//! - The dedup map lives for one bootstrap run; the orchestrator builds a
//!   fresh binder per `initialize`
//! - Direct function references bypass the container and the dedup map

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::schema::CallbackMap;
use crate::config::HandlerRef;
use crate::engine::ListenerControl;
use crate::error::ServerError;
use crate::event::ServerEvent;
use crate::handler::{EventCallback, HandlerContainer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HandlerKey {
    handler: String,
    method: String,
}

/// Record of a symbolic handler method bound by more than one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackCollision {
    pub handler: String,
    pub method: String,
    /// Server that held the binding before.
    pub previous: String,
    /// Server whose binding won.
    pub server: String,
}

/// Binds configured callbacks onto listeners, one bootstrap run at a time.
pub struct CallbackBinder {
    container: Arc<HandlerContainer>,
    bound: HashMap<HandlerKey, String>,
    collisions: Vec<CallbackCollision>,
}

impl CallbackBinder {
    pub fn new(container: Arc<HandlerContainer>) -> Self {
        Self {
            container,
            bound: HashMap::new(),
            collisions: Vec::new(),
        }
    }

    /// Attach every recognized callback in `callbacks` to `listener`.
    ///
    /// Unrecognized event names (including `before_start`, which is not an
    /// engine event) are skipped silently. Symbolic references that cannot
    /// be resolved abort bootstrap.
    pub fn bind(
        &mut self,
        listener: &Arc<dyn ListenerControl>,
        callbacks: &CallbackMap,
        server_name: &str,
    ) -> Result<(), ServerError> {
        for (event_name, handler_ref) in callbacks {
            let Some(event) = ServerEvent::from_name(event_name) else {
                tracing::debug!(
                    server = %server_name,
                    event = %event_name,
                    "Skipping unrecognized event binding"
                );
                continue;
            };

            let callback = match handler_ref {
                HandlerRef::Direct(callback) => callback.clone(),
                HandlerRef::Symbolic { handler, method } => {
                    self.resolve_symbolic(handler, method, server_name)?
                }
            };

            listener.bind_event(event, callback);
            tracing::debug!(server = %server_name, event = %event, "Callback bound");
        }
        Ok(())
    }

    /// Collisions recorded so far, in binding order.
    pub fn collisions(&self) -> &[CallbackCollision] {
        &self.collisions
    }

    pub fn into_collisions(self) -> Vec<CallbackCollision> {
        self.collisions
    }

    fn resolve_symbolic(
        &mut self,
        handler: &str,
        method: &str,
        server_name: &str,
    ) -> Result<EventCallback, ServerError> {
        let key = HandlerKey {
            handler: handler.to_string(),
            method: method.to_string(),
        };
        if let Some(previous) = self.bound.get(&key) {
            if previous != server_name {
                tracing::warn!(
                    handler = %handler,
                    method = %method,
                    previous = %previous,
                    server = %server_name,
                    "Callback already bound by another server, later binding wins"
                );
                self.collisions.push(CallbackCollision {
                    handler: handler.to_string(),
                    method: method.to_string(),
                    previous: previous.clone(),
                    server: server_name.to_string(),
                });
            }
        }
        self.bound.insert(key, server_name.to_string());

        let instance = self.container.resolve(handler).map_err(|error| {
            tracing::error!(server = %server_name, handler = %handler, error = %error, "Handler not registered");
            ServerError::HandlerResolution {
                server: server_name.to_string(),
                handler: handler.to_string(),
                method: method.to_string(),
            }
        })?;

        // Shared instances learn the binding server's name and stage their
        // middleware once per binding.
        if let Some(aware) = instance.server_name_aware() {
            aware.set_server_name(server_name);
        }
        if let Some(initializer) = instance.middleware_initializer() {
            initializer.init_core_middleware(server_name);
        }

        Arc::clone(&instance).resolve_method(method).ok_or_else(|| {
            tracing::error!(server = %server_name, handler = %handler, method = %method, "Handler has no such method");
            ServerError::HandlerResolution {
                server: server_name.to_string(),
                handler: handler.to_string(),
                method: method.to_string(),
            }
        })
    }
}
