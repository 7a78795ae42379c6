//! The page's global scope as seen by the interceptor and the content context.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use streamscope_channel::{FanOut, RelayError, TrySend};
use streamscope_core_types::WindowId;
use tokio::sync::mpsc;

use crate::event_source::NativeEventSourceClass;
use crate::fetch::NativeFetch;

/// A `window.postMessage` delivery. `source` identifies the posting window.
#[derive(Clone, Debug)]
pub struct WindowMessage {
    pub source: WindowId,
    pub data: Value,
}

/// Global bindings, install markers and the message bus of one page.
pub struct PageWindow {
    id: WindowId,
    event_source: RwLock<Arc<dyn NativeEventSourceClass>>,
    fetch: RwLock<Arc<dyn NativeFetch>>,
    markers: Mutex<HashSet<String>>,
    privileged: bool,
    messages: FanOut<WindowMessage>,
}

impl PageWindow {
    pub fn new(
        event_source: Arc<dyn NativeEventSourceClass>,
        fetch: Arc<dyn NativeFetch>,
    ) -> Arc<Self> {
        Arc::new(Self::build(event_source, fetch, false))
    }

    /// A browser-internal page where content scripts cannot run.
    pub fn privileged(
        event_source: Arc<dyn NativeEventSourceClass>,
        fetch: Arc<dyn NativeFetch>,
    ) -> Arc<Self> {
        Arc::new(Self::build(event_source, fetch, true))
    }

    fn build(
        event_source: Arc<dyn NativeEventSourceClass>,
        fetch: Arc<dyn NativeFetch>,
        privileged: bool,
    ) -> Self {
        Self {
            id: WindowId::new(),
            event_source: RwLock::new(event_source),
            fetch: RwLock::new(fetch),
            markers: Mutex::new(HashSet::new()),
            privileged,
            messages: FanOut::new(),
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// The current `EventSource` binding.
    pub fn event_source(&self) -> Arc<dyn NativeEventSourceClass> {
        Arc::clone(&self.event_source.read())
    }

    pub fn set_event_source(&self, class: Arc<dyn NativeEventSourceClass>) {
        *self.event_source.write() = class;
    }

    /// The current `fetch` binding.
    pub fn fetch(&self) -> Arc<dyn NativeFetch> {
        Arc::clone(&self.fetch.read())
    }

    pub fn set_fetch(&self, fetch: Arc<dyn NativeFetch>) {
        *self.fetch.write() = fetch;
    }

    /// Set a global marker. Returns false if it was already set.
    pub fn mark(&self, marker: &str) -> bool {
        self.markers.lock().insert(marker.to_string())
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.lock().contains(marker)
    }

    /// `window.postMessage(data, "*")` from this window's own scripts.
    pub fn post_message(&self, data: Value) -> Result<(), RelayError> {
        self.post_message_from(self.id, data)
    }

    /// A message arriving from another window, such as an embedded frame.
    pub fn post_message_from(&self, source: WindowId, data: Value) -> Result<(), RelayError> {
        self.messages.try_send(WindowMessage { source, data })
    }

    /// Receive every message posted from now on, in post order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<WindowMessage> {
        self.messages.subscribe()
    }
}
