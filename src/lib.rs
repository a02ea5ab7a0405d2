pub mod app_init;
pub mod cli;
pub mod client;
pub mod config;
pub mod domain;
pub mod id;
pub mod logging;
pub mod protocol;
pub mod relay_client;
pub mod result;
pub mod server;
pub mod service;
pub mod session;
pub mod store;
