//! GitHub client modules
//!
//! A small REST client for the user, repository and follower endpoints,
//! split into transport, configuration and error handling.

pub mod api;
pub mod config;
pub mod error;

pub use api::GithubApi;
pub use config::{ClientConfig, RequestConfig};
pub use error::ClientError;
