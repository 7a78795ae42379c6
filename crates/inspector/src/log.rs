//! The per-page record handed to display layers: observed streams in arrival order and the
//! ordered events of each.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use streamscope_core_types::{
    CaptureEvent, StreamEvent, StreamId, StreamKind, StreamOpened, StreamSession,
};

/// Event type recorded for raw `fetch-chunk` payloads.
pub const RAW_CHUNK_EVENT_TYPE: &str = "stream";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "kebab-case")]
pub enum StreamStatus {
    Open,
    /// The event-stream connection reported an error; it may still reconnect on its own.
    Errored,
    Completed,
    Failed(String),
}

#[derive(Debug)]
pub struct StreamLog {
    sessions: Vec<StreamSession>,
    events: HashMap<StreamId, VecDeque<StreamEvent>>,
    status: HashMap<StreamId, StreamStatus>,
    history: usize,
}

impl Default for StreamLog {
    fn default() -> Self {
        Self::new(1_024)
    }
}

impl StreamLog {
    pub fn new(history: usize) -> Self {
        Self {
            sessions: Vec::new(),
            events: HashMap::new(),
            status: HashMap::new(),
            history: history.max(1),
        }
    }

    /// Fold one delivered capture event into the log. Returns the stream event it recorded,
    /// if any.
    pub fn apply(&mut self, event: &CaptureEvent) -> Option<StreamEvent> {
        match event {
            CaptureEvent::EsConnect(opened) => {
                self.open(StreamKind::Sse, opened);
                None
            }
            CaptureEvent::FetchStart(opened) => {
                self.open(StreamKind::FetchStream, opened);
                None
            }
            CaptureEvent::EsMessage(message) => Some(self.record(StreamEvent::from(message))),
            CaptureEvent::FetchChunk(chunk) => Some(self.record(StreamEvent {
                session_id: chunk.id,
                event_type: RAW_CHUNK_EVENT_TYPE.to_string(),
                data: chunk.chunk.clone(),
                time: chunk.time,
            })),
            CaptureEvent::EsError(fault) => {
                self.status.insert(fault.id, StreamStatus::Errored);
                None
            }
            CaptureEvent::FetchDone(closed) => {
                self.status.insert(closed.id, StreamStatus::Completed);
                None
            }
            CaptureEvent::FetchError(failed) => {
                self.status
                    .insert(failed.id, StreamStatus::Failed(failed.error.clone()));
                None
            }
        }
    }

    fn open(&mut self, kind: StreamKind, opened: &StreamOpened) {
        if self.sessions.iter().any(|session| session.id == opened.id) {
            return;
        }
        self.sessions.push(StreamSession::from_opened(kind, opened));
        self.events.entry(opened.id).or_default();
        self.status.insert(opened.id, StreamStatus::Open);
    }

    fn record(&mut self, event: StreamEvent) -> StreamEvent {
        let events = self.events.entry(event.session_id).or_default();
        if events.len() == self.history {
            events.pop_front();
        }
        events.push_back(event.clone());
        event
    }

    pub fn sessions(&self) -> &[StreamSession] {
        &self.sessions
    }

    pub fn session(&self, id: StreamId) -> Option<&StreamSession> {
        self.sessions.iter().find(|session| session.id == id)
    }

    pub fn events_for(&self, id: StreamId) -> Vec<StreamEvent> {
        self.events
            .get(&id)
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn status(&self, id: StreamId) -> Option<&StreamStatus> {
        self.status.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.events.is_empty()
    }

    /// Forget everything, as on navigation of the inspected page.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.events.clear();
        self.status.clear();
    }
}
