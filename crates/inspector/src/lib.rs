//! Inspection-session side of StreamScope.
//!
//! A session opens a channel to the background, announces the page it inspects and keeps a
//! [`StreamLog`] of what is routed to it. The background never reconnects on its own, so the
//! session retries with a fixed delay for as long as it lives.

pub mod config;
pub mod log;
pub mod session;

pub use config::InspectorConfig;
pub use log::{StreamLog, StreamStatus, RAW_CHUNK_EVENT_TYPE};
pub use session::{InspectionSession, SessionHandle};
