use std::path::{Path, PathBuf};

use streamscope_cli::StreamScopeConfig;

pub struct CliContext {
    config: StreamScopeConfig,
    config_path: Option<PathBuf>,
}

impl CliContext {
    pub fn new(config: StreamScopeConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    pub fn config(&self) -> &StreamScopeConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
