//! The extension messaging runtime that joins content contexts, the background context and
//! inspection sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use streamscope_channel::{mailbox, Mailbox, RelayError, TrySend};
use streamscope_core_types::{CaptureEvent, PageId};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::port::{port_pair, IncomingPort, SessionEnd};

/// Sender metadata attached to one-shot messages. Only content contexts running inside a page
/// carry a page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageSender {
    pub page: Option<PageId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeMessage {
    pub sender: MessageSender,
    pub event: CaptureEvent,
}

/// What a running background context listens on.
pub struct BackgroundInbox {
    pub messages: UnboundedReceiver<RuntimeMessage>,
    pub connects: UnboundedReceiver<IncomingPort>,
}

struct BackgroundEndpoint {
    messages: Mailbox<RuntimeMessage>,
    connects: Mailbox<IncomingPort>,
}

impl BackgroundEndpoint {
    fn is_alive(&self) -> bool {
        !self.messages.is_closed() && !self.connects.is_closed()
    }
}

#[derive(Default)]
pub struct ExtensionRuntime {
    endpoint: RwLock<Option<BackgroundEndpoint>>,
    invalidated: AtomicBool,
}

impl ExtensionRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bring up a background context. Any previous one is replaced; its inbox stops receiving.
    pub fn start_background(&self) -> BackgroundInbox {
        let (messages, message_rx) = mailbox();
        let (connects, connect_rx) = mailbox();
        *self.endpoint.write() = Some(BackgroundEndpoint { messages, connects });
        debug!("background context started");
        BackgroundInbox {
            messages: message_rx,
            connects: connect_rx,
        }
    }

    pub fn is_background_alive(&self) -> bool {
        self.endpoint
            .read()
            .as_ref()
            .map(BackgroundEndpoint::is_alive)
            .unwrap_or(false)
    }

    /// The extension was reloaded or removed underneath live content contexts.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
        self.endpoint.write().take();
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }

    /// One-shot message to the background. Never blocks.
    pub fn send_message(&self, sender: MessageSender, event: CaptureEvent) -> Result<(), RelayError> {
        if self.is_invalidated() {
            return Err(RelayError::Closed);
        }
        let endpoint = self.endpoint.read();
        let endpoint = endpoint.as_ref().ok_or(RelayError::Unreachable)?;
        endpoint.messages.try_send(RuntimeMessage { sender, event })
    }

    /// Open a named long-lived channel to the background.
    pub fn connect(&self, name: &str) -> Result<SessionEnd, RelayError> {
        if self.is_invalidated() {
            return Err(RelayError::Closed);
        }
        let endpoint = self.endpoint.read();
        let endpoint = endpoint.as_ref().ok_or(RelayError::Unreachable)?;
        let (incoming, end) = port_pair(name);
        endpoint.connects.try_send(incoming)?;
        Ok(end)
    }
}
