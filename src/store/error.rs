use std::path::PathBuf;

use compact_str::CompactString;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("User '{login}' does not exist in the database")]
    UnknownUser { login: CompactString },

    #[error("Database worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl StoreError {
    pub fn unknown_user(login: impl Into<CompactString>) -> Self {
        Self::UnknownUser { login: login.into() }
    }
}
