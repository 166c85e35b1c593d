use crate::metering_han::ConnectionSettings;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_LOCATIONS: [&str; 2] = ["config/han2prom.yaml", "han2prom.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config file {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Unable to parse config file {path:?}: {source}")]
    Parse { path: PathBuf, source: serde_yml::Error },
    #[error("No serial bridge endpoints configured")]
    NoEndpoints,
    #[error("Endpoint '{0}' is not in host:port form")]
    InvalidEndpoint(String),
    #[error("Invalid connection timing: {0}")]
    InvalidTiming(String),
}

fn httpd_enabled_default() -> bool { return true }
fn httpd_port_default() -> u16 { return 9102 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct HttpdConfig {
    #[serde(default="httpd_enabled_default")]
    pub enabled: bool,
    #[serde(default="httpd_port_default")]
    pub port: u16
}

fn mqtt_port_default() -> u16 { return 1883 }
fn mqtt_client_name_default() -> String { return "han2prom".to_string() }
fn mqtt_base_topic_default() -> String { return "han2prom".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default="mqtt_port_default")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
    #[serde(default="mqtt_base_topic_default")]
    pub base_topic: String,
}

fn dial_timeout_default() -> u64 { return 10 }
fn read_timeout_default() -> u64 { return 25 }
fn backoff_base_default() -> u64 { return 10 }
fn backoff_max_default() -> u64 { return 15 * 60 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ConnectionConfig {
    #[serde(default="dial_timeout_default")]
    pub dial_timeout_secs: u64,
    #[serde(default="read_timeout_default")]
    pub read_timeout_secs: u64,
    #[serde(default="backoff_base_default")]
    pub backoff_base_secs: u64,
    #[serde(default="backoff_max_default")]
    pub backoff_max_secs: u64,
}

impl ConnectionConfig {
    /// All timings non-zero, backoff base not above the cap
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dial_timeout_secs == 0 {
            return Err(ConfigError::InvalidTiming("dial_timeout_secs must be at least 1".to_string()));
        }
        if self.read_timeout_secs == 0 {
            return Err(ConfigError::InvalidTiming("read_timeout_secs must be at least 1".to_string()));
        }
        if self.backoff_base_secs == 0 {
            return Err(ConfigError::InvalidTiming("backoff_base_secs must be at least 1".to_string()));
        }
        if self.backoff_base_secs > self.backoff_max_secs {
            return Err(ConfigError::InvalidTiming(format!(
                "backoff_base_secs ({}) is larger than backoff_max_secs ({})",
                self.backoff_base_secs, self.backoff_max_secs
            )));
        }
        Ok(())
    }

    pub fn settings(&self) -> ConnectionSettings {
        return ConnectionSettings {
            dial_timeout: Duration::from_secs(self.dial_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            backoff_base: Duration::from_secs(self.backoff_base_secs),
            backoff_max: Duration::from_secs(self.backoff_max_secs),
        };
    }
}

fn httpd_default() -> HttpdConfig { return HttpdConfig { enabled: httpd_enabled_default(), port: httpd_port_default() } }
fn connection_default() -> ConnectionConfig {
    return ConnectionConfig {
        dial_timeout_secs: dial_timeout_default(),
        read_timeout_secs: read_timeout_default(),
        backoff_base_secs: backoff_base_default(),
        backoff_max_secs: backoff_max_default(),
    }
}
fn freshness_default() -> u64 { return 20 }
fn shutdown_grace_default() -> u64 { return 30 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    /* host:port of every serial bridge */
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default="httpd_default")]
    pub httpd: HttpdConfig,
    #[serde(default="freshness_default")]
    pub freshness_secs: u64,
    #[serde(default="shutdown_grace_default")]
    pub shutdown_grace_secs: u64,
    #[serde(default="connection_default")]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
}

impl Default for Config {
    fn default() -> Self {
        return Config {
            endpoints: Vec::new(),
            httpd: httpd_default(),
            freshness_secs: freshness_default(),
            shutdown_grace_secs: shutdown_grace_default(),
            connection: connection_default(),
            mqtt: None,
        }
    }
}

impl Config {
    /// Reads the given file, or the first of the default locations that exists.
    /// Without any file the defaults are used, endpoints may still come from the command line.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        for candidate in CONFIG_LOCATIONS {
            let candidate = Path::new(candidate);
            if candidate.exists() {
                return Self::from_file(candidate);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config: Config = serde_yml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        info!("Config loaded from {path:?}");
        Ok(config)
    }

    /// Appends endpoints, keeping the first occurrence of duplicates
    pub fn add_endpoints<I: IntoIterator<Item = String>>(&mut self, extra: I) {
        self.endpoints.extend(extra);
        let mut seen = HashSet::new();
        self.endpoints.retain(|e| seen.insert(e.clone()));
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }

        for endpoint in self.endpoints.iter() {
            let valid = match endpoint.rsplit_once(':') {
                Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
                None => false,
            };
            if !valid {
                return Err(ConfigError::InvalidEndpoint(endpoint.clone()));
            }
        }

        self.connection.validate()
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
