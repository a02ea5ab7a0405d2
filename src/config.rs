use std::path::{Path, PathBuf};

use compact_str::CompactString;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::{
    client::{ClientConfig, ClientError, config::DEFAULT_BASE_URL},
    result::{RelayError, Result},
};

pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_DATABASE: &str = "GHRELAY_DATABASE";
pub const ENV_LISTEN: &str = "GHRELAY_LISTEN";

/// Server settings persisted in `ghrelay.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub listen_addr: CompactString,
    pub database_path: PathBuf,
    pub github_url: CompactString,
    pub github_token: Option<CompactString>,
    pub per_page: u32,
    pub request_timeout_secs: u64,
    pub log_level: Option<CompactString>,
    pub log_dir: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".into(),
            database_path: default_database_path(),
            github_url: DEFAULT_BASE_URL.into(),
            github_token: None,
            per_page: 100,
            request_timeout_secs: 30,
            log_level: None,
            log_dir: None,
            log_json: false,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(dirs) = BaseDirs::new() {
        dirs.config_dir().join("ghrelay.toml")
    } else {
        PathBuf::from("ghrelay.toml")
    }
}

pub fn default_database_path() -> PathBuf {
    if let Some(dirs) = BaseDirs::new() {
        dirs.data_local_dir().join("ghrelay").join("ghrelay.db")
    } else {
        PathBuf::from("ghrelay.db")
    }
}

/// Load the config file, writing the defaults first if it does not exist
pub fn load_config(config_file: &Path) -> Result<RelayConfig> {
    confy::load_path(config_file)
        .map_err(|e| RelayError::config_load_error(config_file.to_path_buf(), e))
}

impl RelayConfig {
    /// Apply overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = lookup(ENV_GITHUB_TOKEN).filter(|t| !t.trim().is_empty()) {
            self.github_token = Some(token.trim().into());
        }
        if let Some(path) = lookup(ENV_DATABASE).filter(|p| !p.is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup(ENV_LISTEN).filter(|a| !a.is_empty()) {
            self.listen_addr = addr.into();
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.listen_addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {},
            _ => {
                return Err(RelayError::config_validation_error(
                    "listen_addr",
                    "Listen address must look like host:port",
                ));
            },
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(RelayError::config_validation_error(
                "database_path",
                "Database path cannot be empty",
            ));
        }

        ClientConfig::from(self).validate().map_err(|e| match e {
            ClientError::ConfigValidation { field, message } => {
                RelayError::config_validation_error(field, message)
            },
            other => RelayError::from(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr, "0.0.0.0:5000");
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            (ENV_GITHUB_TOKEN, " ghp_secret "),
            (ENV_DATABASE, "/tmp/relay.db"),
            (ENV_LISTEN, "127.0.0.1:6000"),
        ]
        .into_iter()
        .collect();

        let config =
            RelayConfig::default().with_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.github_token.as_deref(), Some("ghp_secret"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/relay.db"));
        assert_eq!(config.listen_addr, "127.0.0.1:6000");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let config = RelayConfig::default().with_env_from(|_| Some(String::new()));
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn rejects_listen_address_without_port() {
        let config = RelayConfig { listen_addr: "localhost".into(), ..RelayConfig::default() };
        assert!(matches!(
            config.validate(),
            Err(RelayError::ConfigValidationError { field, .. }) if field == "listen_addr"
        ));
    }

    #[test]
    fn client_validation_surfaces_as_config_error() {
        let config = RelayConfig { per_page: 0, ..RelayConfig::default() };
        assert!(matches!(
            config.validate(),
            Err(RelayError::ConfigValidationError { field, .. }) if field == "per_page"
        ));
    }

    #[test]
    fn config_file_round_trips_through_confy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ghrelay.toml");

        let config = RelayConfig {
            github_token: Some("ghp_token".into()),
            per_page: 50,
            ..RelayConfig::default()
        };
        confy::store_path(&path, &config).unwrap();

        assert_eq!(load_config(&path).unwrap(), config);
    }
}
