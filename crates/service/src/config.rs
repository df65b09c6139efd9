use std::path::{Path, PathBuf};
use std::{fs, str::FromStr};

use serde::{Deserialize, Serialize};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Public-class backend settings. Present means `public` and `user`
///  scopes are available.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicBackendConfig {
    /// on system path to the public blobs store, if not set
    ///  then an in-memory store will be used
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// byte quota for the public backend
    #[serde(default)]
    pub max_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // local backend
    /// on system path to the local blobs store, if not set
    ///  then an in-memory store will be used
    #[serde(default)]
    pub local_store_path: Option<PathBuf>,
    /// byte quota for the local backend
    #[serde(default)]
    pub local_max_size: Option<u64>,

    // identity
    /// PEM encoded node secret, if not set then a
    ///  new secret will be generated
    #[serde(default)]
    pub node_secret_path: Option<PathBuf>,
    /// addresses reported by node info
    #[serde(default)]
    pub announce_addresses: Vec<String>,

    // crypto
    /// reproducible ciphertexts, for fixtures only
    #[serde(default)]
    pub deterministic_encryption: bool,

    // misc
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // public backend, kept last so it renders after the plain keys
    #[serde(default)]
    pub public: Option<PublicBackendConfig>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_store_path: None,
            local_max_size: None,
            public: None,
            node_secret_path: None,
            announce_addresses: Vec::new(),
            deterministic_encryption: false,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load a TOML config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        config.log_level()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parsed `log_level`
    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
}
