use std::path::PathBuf;

use anyhow::{Context, Result};
use geolocation_permissions::config::load_config_from_path;
use geolocation_permissions::BrokerConfig;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    // Reports go to stdout; keep logs off it.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: BrokerConfig,
    /// Where the config came from; `None` when defaults were used.
    pub path: Option<PathBuf>,
}

pub fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let (config_path, explicit) = match config_path {
        Some(path) => (path.clone(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => {
                warn!("Failed to get config directory, using defaults");
                return Ok(LoadedConfig {
                    config: BrokerConfig::default(),
                    path: None,
                });
            }
        },
    };

    if config_path.exists() {
        let config = load_config_from_path(&config_path)
            .with_context(|| format!("Failed to load config file {}", config_path.display()))?;
        info!("Loaded configuration from: {}", config_path.display());
        Ok(LoadedConfig {
            config,
            path: Some(config_path),
        })
    } else if explicit {
        anyhow::bail!("Config file not found: {}", config_path.display())
    } else {
        info!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        Ok(LoadedConfig {
            config: BrokerConfig::default(),
            path: None,
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    // Priority: ./config/geoperm.yaml > ~/.config/geoperm/config.yaml
    let local_config = PathBuf::from("config/geoperm.yaml");
    if local_config.exists() {
        return Some(local_config);
    }
    let mut path = dirs::config_dir()?;
    path.push("geoperm");
    path.push("config.yaml");
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_config_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "event_capacity: 16\nmax_queue_len: 4").unwrap();
        let path = file.path().to_path_buf();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.config.event_capacity, 16);
        assert_eq!(loaded.config.max_queue_len, Some(4));
        assert_eq!(loaded.path, Some(path));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "event_capacity: 0").unwrap();
        let path = file.path().to_path_buf();
        assert!(load_config(Some(&path)).is_err());
    }
}
