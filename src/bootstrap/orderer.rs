//! Startup ordering for server definitions.

use crate::config::schema::{ServerDefinition, ServerKind};

/// Order definitions so a WebSocket or HTTP server ends up first and
/// becomes the primary listener.
///
/// WebSocket and HTTP definitions move to the front because the primary
/// listener's engine type decides which protocol upgrades are available: a
/// WebSocket listener still serves plain HTTP, the reverse does not hold.
/// Each qualifying definition is inserted at the front as it is
/// encountered, so with several of them the last one encountered ends up
/// first. Everything else keeps its relative order.
pub fn order_servers(definitions: &[ServerDefinition]) -> Vec<ServerDefinition> {
    let mut ordered: Vec<ServerDefinition> = Vec::with_capacity(definitions.len());
    let mut websocket_seen = false;

    for definition in definitions {
        match definition.kind {
            ServerKind::WebSocket => {
                websocket_seen = true;
                ordered.insert(0, definition.clone());
            }
            ServerKind::Http if !websocket_seen => {
                ordered.insert(0, definition.clone());
            }
            _ => ordered.push(definition.clone()),
        }
    }

    ordered
}
