use serde::{Deserialize, Serialize};

use crate::{StreamId, StreamMessage, StreamOpened};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamKind {
    Sse,
    FetchStream,
}

/// One logical streaming connection observed in the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSession {
    pub id: StreamId,
    pub kind: StreamKind,
    pub url: String,
    /// Only meaningful for fetch streams; event-stream connections carry `None`.
    pub method: Option<String>,
    pub start_time: i64,
}

impl StreamSession {
    pub fn from_opened(kind: StreamKind, opened: &StreamOpened) -> Self {
        Self {
            id: opened.id,
            kind,
            url: opened.url.clone(),
            method: opened.method.clone(),
            start_time: opened.start_time,
        }
    }

    /// Label shown by display layers: the HTTP method, or `SSE` for event-stream connections.
    pub fn method_label(&self) -> &str {
        match (self.kind, self.method.as_deref()) {
            (StreamKind::Sse, _) => "SSE",
            (StreamKind::FetchStream, Some(method)) => method,
            (StreamKind::FetchStream, None) => "GET",
        }
    }
}

/// One decoded message belonging to a [`StreamSession`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    pub session_id: StreamId,
    pub event_type: String,
    pub data: String,
    pub time: i64,
}

impl From<&StreamMessage> for StreamEvent {
    fn from(message: &StreamMessage) -> Self {
        Self {
            session_id: message.id,
            event_type: message.event_type.clone(),
            data: message.data.clone(),
            time: message.time,
        }
    }
}
