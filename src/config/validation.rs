//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce unique server names across the collection
//! - Reject definitions an engine could never bind
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ServerCollection -> Result<(), Vec<ValidationError>>
//! - Runs before the orchestrator accepts a collection
//! - Unrecognized callback event names are not errors; the binder skips
//!   them so configurations may carry names for newer engines

use std::collections::BTreeSet;

use thiserror::Error;

use crate::config::schema::ServerCollection;

/// A single semantic problem in a server collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no servers defined")]
    NoServers,

    #[error("duplicate server name '{0}'")]
    DuplicateName(String),

    #[error("server '{0}' has an empty host")]
    EmptyHost(String),
}

/// Validate a server collection, collecting every problem found.
pub fn validate(config: &ServerCollection) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.servers.is_empty() {
        errors.push(ValidationError::NoServers);
    }

    let mut seen = BTreeSet::new();
    for definition in &config.servers {
        if !seen.insert(definition.name.as_str()) {
            errors.push(ValidationError::DuplicateName(definition.name.clone()));
        }
        if definition.host.is_empty() {
            errors.push(ValidationError::EmptyHost(definition.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ServerDefinition, ServerKind};

    #[test]
    fn accepts_minimal_collection() {
        let config = ServerCollection::default()
            .with_server(ServerDefinition::new("http", ServerKind::Http, "0.0.0.0", 9501));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn rejects_empty_collection() {
        let errors = validate(&ServerCollection::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoServers]);
    }

    #[test]
    fn rejects_duplicate_names() {
        let config = ServerCollection::default()
            .with_server(ServerDefinition::new("api", ServerKind::Http, "0.0.0.0", 9501))
            .with_server(ServerDefinition::new("api", ServerKind::Base, "0.0.0.0", 9502));
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateName("api".to_string())]);
    }

    #[test]
    fn collects_all_errors() {
        let config = ServerCollection::default()
            .with_server(ServerDefinition::new("a", ServerKind::Http, "", 9501))
            .with_server(ServerDefinition::new("a", ServerKind::Base, "", 9502));
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::DuplicateName("a".to_string())));
    }

    #[test]
    fn port_zero_is_allowed() {
        // Port 0 asks the engine for an ephemeral port, useful in tests.
        let config = ServerCollection::default()
            .with_server(ServerDefinition::new("http", ServerKind::Http, "127.0.0.1", 0));
        assert!(validate(&config).is_ok());
    }
}
