use std::path::PathBuf;

use anyhow::{Context, Result};
use streamscope_cli::config::default_config_path;
use streamscope_cli::StreamScopeConfig;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level variable consulted when `RUST_LOG` is unset.
pub const ENV_LOG: &str = "STREAMSCOPE_LOG";

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    // --debug outranks the environment
    let filter = if debug {
        EnvFilter::new(level.to_string())
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_from_env(ENV_LOG))
            .unwrap_or_else(|_| EnvFilter::new(level.to_string()))
    };

    // stdout carries event output, so logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: StreamScopeConfig,
    pub path: Option<PathBuf>,
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = config_path.cloned().or_else(default_config_path);

    let mut config = match &config_path {
        Some(path) if path.exists() => {
            let config = StreamScopeConfig::load(path)
                .await
                .context("Failed to load config file")?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        Some(path) => {
            warn!("Config file not found, using defaults: {}", path.display());
            StreamScopeConfig::default()
        }
        None => {
            warn!("No config directory available, using defaults");
            StreamScopeConfig::default()
        }
    };

    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    Ok(LoadedConfig {
        config,
        path: config_path,
    })
}
