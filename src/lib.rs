//! StreamScope library
//!
//! Exposes the pipeline harness and configuration for the binary and integration tests.

pub mod config;
pub mod net;
pub mod pipeline;

pub use config::{ConfigError, StreamScopeConfig};
pub use net::ReqwestFetch;
pub use pipeline::Pipeline;
