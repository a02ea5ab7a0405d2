use std::path::PathBuf;

use compact_str::{CompactString, ToCompactString};
use thiserror::Error;

use crate::{client::ClientError, protocol::ProtocolError, store::StoreError};

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to load configuration from: {path}: {message}")]
    ConfigLoadError { path: PathBuf, message: String },

    #[error("Invalid configuration: {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error(transparent)]
    Github(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Could not connect to the relay server at {addr}. Is it running? Start it with `ghrelay serve`.")]
    ServerUnavailable { addr: CompactString },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    GeneralError(CompactString),
}

impl RelayError {
    /// Create a configuration load error
    pub fn config_load_error(path: PathBuf, source: impl std::fmt::Display) -> Self {
        Self::ConfigLoadError { path, message: source.to_string() }
    }

    /// Create a configuration validation error
    pub fn config_validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidationError { field: field.into(), message: message.into() }
    }

    pub fn general(message: impl std::fmt::Display) -> Self {
        Self::GeneralError(message.to_compact_string())
    }
}
