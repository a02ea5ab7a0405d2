//! Error types for the GitHub client

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse response from {endpoint}: {message}")]
    JsonParse {
        endpoint: CompactString,
        message: CompactString,
        #[source]
        source: serde_json::Error,
    },

    #[error("GitHub API error: {message}")]
    GithubApi { message: CompactString },

    #[error("Invalid configuration: {field}: {message}")]
    ConfigValidation { field: CompactString, message: CompactString },

    #[error("Authentication failed")]
    Authentication,

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: CompactString },

    #[error("Not found: {resource}")]
    NotFound { resource: CompactString },

    #[error("Rate limit exceeded{}", reset_at.map(|t| format!(" (resets at {t})")).unwrap_or_default())]
    RateLimit { reset_at: Option<DateTime<Utc>> },
}

impl ClientError {
    pub fn json_parse(
        endpoint: impl Into<CompactString>,
        message: impl Into<CompactString>,
        source: serde_json::Error,
    ) -> Self {
        Self::JsonParse { endpoint: endpoint.into(), message: message.into(), source }
    }

    pub fn github_api(message: impl Into<CompactString>) -> Self {
        Self::GithubApi { message: message.into() }
    }

    pub fn config_validation(
        field: impl Into<CompactString>,
        message: impl Into<CompactString>,
    ) -> Self {
        Self::ConfigValidation { field: field.into(), message: message.into() }
    }

    pub fn invalid_url(url: impl Into<CompactString>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    pub fn not_found(resource: impl Into<CompactString>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    pub fn rate_limit(reset_at: Option<DateTime<Utc>>) -> Self {
        Self::RateLimit { reset_at }
    }

    /// True when GitHub reported that the requested resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
