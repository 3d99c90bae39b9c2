//! Runtime configuration for the permission service.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Tunables shared by every tab spawned from one service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Buffer size of the permission event broadcast channel.
    pub event_capacity: usize,
    /// Upper bound on queued origins per tab. `None` leaves the queue unbounded.
    pub max_queue_len: Option<usize>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            max_queue_len: None,
        }
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_capacity must be greater than zero".into(),
            ));
        }
        if self.max_queue_len == Some(0) {
            return Err(ConfigError::Invalid(
                "max_queue_len must be greater than zero when set".into(),
            ));
        }
        Ok(())
    }
}

/// Errors surfaced while loading broker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize config: {0}")]
    Deserialize(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_config_from_reader<R: Read>(mut reader: R) -> Result<BrokerConfig, ConfigError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    parse_config_str(&buf)
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<BrokerConfig, ConfigError> {
    let file = File::open(path.as_ref())?;
    load_config_from_reader(file)
}

pub fn parse_config_str(raw: &str) -> Result<BrokerConfig, ConfigError> {
    let config: BrokerConfig = match serde_json::from_str(raw) {
        Ok(config) => config,
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            ConfigError::Deserialize(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        })?,
    };
    config.validate()?;
    Ok(config)
}
