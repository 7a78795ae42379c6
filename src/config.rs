//! Aggregated configuration for the StreamScope binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stream_interceptor::InterceptorConfig;
use streamscope_inspector::InspectorConfig;
use streamscope_registry::RegistryConfig;
use streamscope_relay::RelayConfig;
use thiserror::Error;

pub const ENV_RECONNECT_MS: &str = "STREAMSCOPE_RECONNECT_MS";
pub const ENV_RAW_CHUNKS: &str = "STREAMSCOPE_RAW_CHUNKS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidOverride { key: &'static str, value: String },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamScopeConfig {
    pub interceptor: InterceptorConfig,
    pub relay: RelayConfig,
    pub registry: RegistryConfig,
    pub inspector: InspectorConfig,
}

impl StreamScopeConfig {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Deserialize {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `STREAMSCOPE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_RECONNECT_MS) {
            self.inspector.reconnect_delay_ms =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOverride {
                        key: ENV_RECONNECT_MS,
                        value: value.clone(),
                    })?;
        }
        if let Some(value) = lookup(ENV_RAW_CHUNKS) {
            self.interceptor.capture_raw_chunks = match value.trim().to_ascii_lowercase().as_str()
            {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidOverride {
                        key: ENV_RAW_CHUNKS,
                        value,
                    })
                }
            };
        }
        Ok(())
    }
}

/// `$CONFIG_DIR/streamscope/config.yaml`, when the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("streamscope").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[tokio::test]
    async fn partial_yaml_keeps_defaults_elsewhere() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "inspector:\n  reconnect_delay_ms: 250\ninterceptor:\n  capture_raw_chunks: true"
        )
        .unwrap();

        let config = StreamScopeConfig::load(file.path()).await.unwrap();
        assert_eq!(config.inspector.reconnect_delay_ms, 250);
        assert_eq!(config.inspector.port_name, "panel");
        assert!(config.interceptor.capture_raw_chunks);
        assert!(config.relay.window_filter);
        assert!(config.registry.reinject_on_announce);
    }

    #[tokio::test]
    async fn unreadable_and_malformed_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(matches!(
            StreamScopeConfig::load(&missing).await,
            Err(ConfigError::Io { .. })
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "inspector: [1, 2").unwrap();
        assert!(matches!(
            StreamScopeConfig::load(&bad).await,
            Err(ConfigError::Deserialize { .. })
        ));
    }

    #[test]
    fn environment_overrides_apply_and_validate() {
        let env: HashMap<&str, &str> = [(ENV_RECONNECT_MS, "75"), (ENV_RAW_CHUNKS, "on")]
            .into_iter()
            .collect();
        let mut config = StreamScopeConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.inspector.reconnect_delay_ms, 75);
        assert!(config.interceptor.capture_raw_chunks);

        let err = config
            .apply_overrides(|key| (key == ENV_RECONNECT_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOverride {
                key: ENV_RECONNECT_MS,
                ..
            }
        ));
    }
}
