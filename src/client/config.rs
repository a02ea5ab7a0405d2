//! Settings for the GitHub REST client

use std::time::Duration;

use compact_str::CompactString;

use super::error::{ClientError, Result};
use crate::config::RelayConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// GitHub caps list endpoints at this page size
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, `https://api.github.com` or an Enterprise `/api/v3` prefix
    pub base_url: CompactString,
    /// Personal access token; anonymous requests when absent
    pub token: Option<CompactString>,
    pub request: RequestConfig,
}

#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub per_page: u32,
    pub timeout: Duration,
    /// GitHub rejects requests without a User-Agent
    pub user_agent: CompactString,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            per_page: MAX_PER_PAGE,
            timeout: Duration::from_secs(30),
            user_agent: concat!("ghrelay/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl ClientConfig {
    /// Blank tokens count as no token
    pub fn new(base_url: impl Into<CompactString>, token: Option<CompactString>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
            request: RequestConfig::default(),
        }
    }

    /// Check the base URL, token and request limits before any request is made
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            ClientError::config_validation(
                "github_url",
                format!("'{}' is not a URL: {e}", self.base_url),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::config_validation(
                "github_url",
                "Only http and https URLs are supported",
            ));
        }

        if self
            .token
            .as_ref()
            .is_some_and(|token| token.chars().any(char::is_whitespace))
        {
            return Err(ClientError::config_validation(
                "github_token",
                "Token contains whitespace",
            ));
        }

        if !(1..=MAX_PER_PAGE).contains(&self.request.per_page) {
            return Err(ClientError::config_validation(
                "per_page",
                format!("Expected 1..={MAX_PER_PAGE}"),
            ));
        }
        if self.request.timeout.is_zero() {
            return Err(ClientError::config_validation(
                "request_timeout_secs",
                "Must be at least one second",
            ));
        }

        Ok(())
    }

    pub fn with_request(mut self, request: RequestConfig) -> Self {
        self.request = request;
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.request.per_page = per_page;
        self
    }
}

impl From<&RelayConfig> for ClientConfig {
    fn from(config: &RelayConfig) -> Self {
        Self::new(config.github_url.clone(), config.github_token.clone()).with_request(
            RequestConfig {
                per_page: config.per_page,
                timeout: Duration::from_secs(config.request_timeout_secs),
                ..RequestConfig::default()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_without_token() {
        let config = ClientConfig::new(DEFAULT_BASE_URL, None);
        assert!(config.validate().is_ok());
        assert!(config.token.is_none());
    }

    #[test]
    fn blank_token_is_treated_as_absent() {
        let config = ClientConfig::new(DEFAULT_BASE_URL, Some("   ".into()));
        assert!(config.token.is_none());
    }

    #[test]
    fn rejects_non_http_base_url() {
        let config = ClientConfig::new("ftp://api.github.com", None);
        assert!(matches!(
            config.validate(),
            Err(ClientError::ConfigValidation { field, .. }) if field == "github_url"
        ));
    }

    #[test]
    fn rejects_out_of_range_page_size() {
        let config = ClientConfig::new(DEFAULT_BASE_URL, None).with_per_page(101);
        assert!(config.validate().is_err());

        let config = ClientConfig::new(DEFAULT_BASE_URL, None).with_per_page(0);
        assert!(config.validate().is_err());
    }
}
