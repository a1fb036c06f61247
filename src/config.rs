//! Client configuration
//!
//! Read from `<config dir>/yume/config.toml`. Every field is optional in the
//! file; a missing file yields the defaults.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::channel::TransportConfig;

const APP_DIR: &str = "yume";
const CONFIG_FILE: &str = "config.toml";

/// Client configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid backend URL {url}: {source}")]
    BackendUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("No data directory available on this platform")]
    NoDataDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the local backend server
    pub backend_url: String,
    pub request_timeout_ms: u64,
    /// Seconds between backend liveness probes
    pub health_interval_secs: u64,
    /// Missed probes before the backend is reported unreachable
    pub unreachable_threshold: u32,
    /// Where persisted client state lives; platform data dir when unset
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:3001".to_string(),
            request_timeout_ms: 30_000,
            health_interval_secs: 5,
            unreachable_threshold: 3,
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit path, or the default location when `None`.
    /// A missing file at the default location is not an error.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.backend_endpoint()?;
        info!("Loaded client config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Validated backend URL
    pub fn backend_endpoint(&self) -> ConfigResult<Url> {
        Url::parse(&self.backend_url).map_err(|source| ConfigError::BackendUrl {
            url: self.backend_url.clone(),
            source,
        })
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::Http {
            endpoint: self.backend_url.clone(),
            timeout_ms: Some(self.request_timeout_ms),
        }
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }

    /// Directory for persisted client state
    pub fn data_dir(&self) -> ConfigResult<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(ConfigError::NoDataDir),
        }
    }
}
