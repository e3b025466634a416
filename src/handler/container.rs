//! Handler registry with singleton resolution.
//!
//! # Responsibilities
//! - Map symbolic handler names to factories registered at startup
//! - Resolve a name to a live instance, once, and cache it
//!
//! # Design Decisions
//! - Resolution is lazy: a registered handler is only constructed when a
//!   callback binding first needs it
//! - One instance per name for the process lifetime; every listener binding
//!   against the same name shares that instance
//! - Factories are invoked outside the registry lock so a factory may
//!   resolve other handlers

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::handler::EventHandler;

type HandlerFactory = Arc<dyn Fn() -> Arc<dyn EventHandler> + Send + Sync>;

/// Resolution failure: nothing registered under the requested name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no handler registered under '{0}'")]
pub struct UnknownHandler(pub String);

/// Registry of event handlers keyed by symbolic name.
#[derive(Default)]
pub struct HandlerContainer {
    factories: Mutex<HashMap<String, HandlerFactory>>,
    resolved: Mutex<HashMap<String, Arc<dyn EventHandler>>>,
}

impl HandlerContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `name`. Replaces any previous factory but
    /// leaves an already-resolved instance in place.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn EventHandler> + Send + Sync + 'static,
    {
        self.lock_factories().insert(name.into(), Arc::new(factory));
    }

    /// Register an already-constructed instance under `name`.
    pub fn register_instance(&self, name: impl Into<String>, instance: Arc<dyn EventHandler>) {
        self.lock_resolved().insert(name.into(), instance);
    }

    /// True when `name` can be resolved, whether or not it has been yet.
    pub fn contains(&self, name: &str) -> bool {
        self.lock_resolved().contains_key(name) || self.lock_factories().contains_key(name)
    }

    /// Resolve `name` to its instance, constructing and caching it on first
    /// use.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn EventHandler>, UnknownHandler> {
        if let Some(instance) = self.lock_resolved().get(name) {
            return Ok(Arc::clone(instance));
        }

        let factory = {
            let factories = self.lock_factories();
            let factory = factories
                .get(name)
                .ok_or_else(|| UnknownHandler(name.to_string()))?;
            Arc::clone(factory)
        };

        let instance = factory();
        let mut resolved = self.lock_resolved();
        // First writer wins if two callers raced on the same name.
        let cached = resolved.entry(name.to_string()).or_insert(instance);
        Ok(Arc::clone(cached))
    }

    fn lock_factories(&self) -> std::sync::MutexGuard<'_, HashMap<String, HandlerFactory>> {
        self.factories.lock().expect("handler factory mutex poisoned")
    }

    fn lock_resolved(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<dyn EventHandler>>> {
        self.resolved.lock().expect("handler cache mutex poisoned")
    }
}
