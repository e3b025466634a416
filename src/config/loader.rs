//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerCollection;
use crate::config::validation::{validate, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read server configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse server configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid server configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load and validate a server collection from a TOML file.
pub fn load(path: &Path) -> Result<ServerCollection, ConfigError> {
    let content = fs::read_to_string(path)?;
    load_str(&content)
}

/// Parse and validate a server collection from TOML text.
pub fn load_str(content: &str) -> Result<ServerCollection, ConfigError> {
    let config: ServerCollection = toml::from_str(content)?;
    validate(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
