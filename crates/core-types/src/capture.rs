//! Capture-event schema shared by the interceptor, both relay hops, the registry and the
//! inspection session. The wire shape is `{ "type": "<kind>", "data": { ... } }`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{StreamId, CAPTURE_TAG};

/// One unit of observation data, keyed by `type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum CaptureEvent {
    EsConnect(StreamOpened),
    EsMessage(StreamMessage),
    EsError(StreamFault),
    FetchStart(StreamOpened),
    FetchChunk(RawChunk),
    FetchDone(StreamClosed),
    FetchError(StreamFailed),
}

impl CaptureEvent {
    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureEvent::EsConnect(_) => "es-connect",
            CaptureEvent::EsMessage(_) => "es-message",
            CaptureEvent::EsError(_) => "es-error",
            CaptureEvent::FetchStart(_) => "fetch-start",
            CaptureEvent::FetchChunk(_) => "fetch-chunk",
            CaptureEvent::FetchDone(_) => "fetch-done",
            CaptureEvent::FetchError(_) => "fetch-error",
        }
    }

    pub fn stream_id(&self) -> StreamId {
        match self {
            CaptureEvent::EsConnect(open) | CaptureEvent::FetchStart(open) => open.id,
            CaptureEvent::EsMessage(message) => message.id,
            CaptureEvent::EsError(fault) => fault.id,
            CaptureEvent::FetchChunk(chunk) => chunk.id,
            CaptureEvent::FetchDone(closed) => closed.id,
            CaptureEvent::FetchError(failed) => failed.id,
        }
    }

    /// Capture time; for connection events this is the start time.
    pub fn time(&self) -> i64 {
        match self {
            CaptureEvent::EsConnect(open) | CaptureEvent::FetchStart(open) => open.start_time,
            CaptureEvent::EsMessage(message) => message.time,
            CaptureEvent::EsError(fault) => fault.time,
            CaptureEvent::FetchChunk(chunk) => chunk.time,
            CaptureEvent::FetchDone(closed) => closed.time,
            CaptureEvent::FetchError(failed) => failed.time,
        }
    }
}

/// Payload of `es-connect` and `fetch-start`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamOpened {
    pub id: StreamId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub start_time: i64,
}

/// One decoded message, from an event-stream connection or a parsed fetch body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    pub id: StreamId,
    pub event_type: String,
    pub data: String,
    pub time: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFault {
    pub id: StreamId,
    pub time: i64,
}

/// Undecoded text chunk of a fetch body, emitted only when raw-chunk capture is enabled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChunk {
    pub id: StreamId,
    pub chunk: String,
    pub time: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamClosed {
    pub id: StreamId,
    pub time: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFailed {
    pub id: StreamId,
    pub error: String,
    pub time: i64,
}

/// Hop-1 message body: a capture event stamped with [`CAPTURE_TAG`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureEnvelope {
    pub source: String,
    pub event: CaptureEvent,
}

impl CaptureEnvelope {
    pub fn tagged(event: CaptureEvent) -> Self {
        Self {
            source: CAPTURE_TAG.to_string(),
            event,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Accepts only tagged messages; anything else posted on the window yields `None`.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let tagged = value
            .get("source")
            .and_then(serde_json::Value::as_str)
            .map(|source| source == CAPTURE_TAG)
            .unwrap_or(false);
        if !tagged {
            return None;
        }
        match serde_json::from_value(value.clone()) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                debug!(%err, "ignoring malformed tagged window message");
                None
            }
        }
    }
}
