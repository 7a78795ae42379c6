use serde::{Deserialize, Serialize};

/// Content-context relay settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Drop window messages not posted by the page's own window.
    pub window_filter: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            window_filter: true,
        }
    }
}
