use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Fixed delay before reconnecting after the channel drops or cannot be opened.
    pub reconnect_delay_ms: u64,
    /// Name given to the session channel when connecting.
    pub port_name: String,
    /// Events kept per stream; older ones are dropped first.
    pub history: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 1_000,
            port_name: "panel".to_string(),
            history: 1_024,
        }
    }
}
