//! Configuration for the page-context interceptor.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Also emit one `fetch-chunk` capture event per decoded body chunk.
    pub capture_raw_chunks: bool,
}
