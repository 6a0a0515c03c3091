//! Layered configuration: built-in defaults → optional YAML file → `APP__`-prefixed
//! environment variables → CLI overrides, merged with `figment`.

use std::time::Duration;

use cp_zones::{ContainerZoneConfig, DbZoneConfig};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen_url: String,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    pub admin_db_connection_url: String,
    pub kube_clients: Vec<ContainerZoneConfig>,
    pub user_db_connections: Vec<DbZoneConfig>,
    /// `RUST_LOG`-style filter directive; overridden by `-v`/`-vv`/`-vvv` on the CLI.
    pub log_filter: String,
    /// Accepted for config-shape parity with the original; unused, since identity-provider
    /// integration beyond a minimal session exchange is out of scope.
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_url: "0.0.0.0:8080".to_owned(),
            shutdown_timeout: Duration::from_secs(30),
            admin_db_connection_url: "sqlite::memory:".to_owned(),
            kube_clients: Vec::new(),
            user_db_connections: Vec::new(),
            log_filter: "info".to_owned(),
            oauth_client_id: None,
            oauth_client_secret: None,
        }
    }
}

impl Config {
    /// Loads defaults, then an optional YAML file, then `APP__`-prefixed environment
    /// variables. CLI overrides are applied afterward by the caller via [`Config::apply_cli`].
    pub fn load(config_path: Option<&std::path::Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("APP__").split("__"));
        figment.extract()
    }

    pub fn apply_cli(&mut self, overrides: &CliOverrides) {
        if let Some(port) = overrides.port {
            if let Some((host, _)) = self.listen_url.rsplit_once(':') {
                self.listen_url = format!("{host}:{port}");
            } else {
                self.listen_url = format!("0.0.0.0:{port}");
            }
        }
        if let Some(filter) = overrides.log_filter.as_ref() {
            self.log_filter = filter.clone();
        }
        if overrides.mock {
            self.admin_db_connection_url = "sqlite::memory:".to_owned();
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// CLI-level overrides layered on top of file/env configuration.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub log_filter: Option<String>,
    pub mock: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_config_file() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.listen_url, "0.0.0.0:8080");
        assert!(config.kube_clients.is_empty());
    }

    #[test]
    fn cli_port_override_rewrites_the_listen_url_host_part() {
        let mut config = Config::default();
        config.apply_cli(&CliOverrides {
            port: Some(9999),
            log_filter: None,
            mock: false,
        });
        assert_eq!(config.listen_url, "0.0.0.0:9999");
    }
}
