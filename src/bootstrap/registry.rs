//! Name-to-listener registry populated during bootstrap.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::schema::ServerKind;
use crate::engine::ListenerControl;

/// What the orchestrator recorded for one wired server.
#[derive(Clone)]
pub struct RegisteredServer {
    pub kind: ServerKind,
    pub handle: Arc<dyn ListenerControl>,
}

impl fmt::Debug for RegisteredServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredServer")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Lookup table other bootstrap-time subsystems use to find a listener by
/// name or kind, e.g. a background-process manager that needs the HTTP
/// listener.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    entries: BTreeMap<String, RegisteredServer>,
}

impl ServerRegistry {
    pub(crate) fn insert(&mut self, name: &str, kind: ServerKind, handle: Arc<dyn ListenerControl>) {
        self.entries
            .insert(name.to_string(), RegisteredServer { kind, handle });
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredServer> {
        self.entries.get(name)
    }

    pub fn handle(&self, name: &str) -> Option<Arc<dyn ListenerControl>> {
        self.entries.get(name).map(|entry| Arc::clone(&entry.handle))
    }

    pub fn kind_of(&self, name: &str) -> Option<ServerKind> {
        self.entries.get(name).map(|entry| entry.kind)
    }

    /// First registered name of the given kind, in name order.
    pub fn find_by_kind(&self, kind: ServerKind) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.kind == kind)
            .map(|(name, _)| name.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
