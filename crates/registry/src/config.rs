use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Best-effort re-injection into the page whenever a session announces itself.
    pub reinject_on_announce: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reinject_on_announce: true,
        }
    }
}
