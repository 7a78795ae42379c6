//! Shared primitives for the StreamScope pipeline: identifiers, timestamps, the capture-event
//! schema carried end-to-end, and the sink seam the interceptor emits into.

pub mod capture;
pub mod model;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use capture::{
    CaptureEnvelope, CaptureEvent, RawChunk, StreamClosed, StreamFailed, StreamFault,
    StreamMessage, StreamOpened,
};
pub use model::{StreamEvent, StreamKind, StreamSession};

/// Tag carried by every page-to-isolated-context message produced by the interceptor.
pub const CAPTURE_TAG: &str = "event-stream-proxy";

/// Event type used when a record does not name one.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Identifier of one observed streaming connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an inspected page, stable for the page's lifetime in the host tool.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one session channel (port). Two ports are the same channel only if their ids match.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub Uuid);

impl PortId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a page window, used to reject messages posted by other windows.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub Uuid);

impl WindowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock capture time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Receiver of capture events. Emitting with nobody listening is a no-op, never an error.
pub trait CaptureSink: Send + Sync {
    fn emit(&self, event: CaptureEvent);
}

