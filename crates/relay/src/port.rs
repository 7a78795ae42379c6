//! Long-lived session channels between an inspection session and the background context.

use serde::{Deserialize, Serialize};
use streamscope_channel::{mailbox, Mailbox, RelayError, TrySend};
use streamscope_core_types::{CaptureEvent, PageId, PortId};
use tokio::sync::mpsc::UnboundedReceiver;

/// Messages a session sends up its channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum SessionMessage {
    /// Announces which page the session inspects.
    Init {
        #[serde(rename = "pageId")]
        page_id: PageId,
    },
}

/// Background-side handle of a session channel.
#[derive(Clone, Debug)]
pub struct SessionPort {
    id: PortId,
    name: String,
    outbound: Mailbox<CaptureEvent>,
}

impl SessionPort {
    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver an event to the session. Fails once the session side is gone.
    pub fn post(&self, event: CaptureEvent) -> Result<(), RelayError> {
        self.outbound.try_send(event)
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// A newly connected channel as the background sees it.
pub struct IncomingPort {
    pub port: SessionPort,
    pub inbox: UnboundedReceiver<SessionMessage>,
}

/// Session-side end of a channel. Dropping it disconnects the channel.
pub struct SessionEnd {
    id: PortId,
    outbox: Mailbox<SessionMessage>,
    inbox: UnboundedReceiver<CaptureEvent>,
}

impl SessionEnd {
    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn post(&self, message: SessionMessage) -> Result<(), RelayError> {
        self.outbox.try_send(message)
    }

    /// Next delivered event; `None` once the background side has disconnected.
    pub async fn recv(&mut self) -> Option<CaptureEvent> {
        self.inbox.recv().await
    }
}

/// Create both ends of a named channel.
pub fn port_pair(name: &str) -> (IncomingPort, SessionEnd) {
    let id = PortId::new();
    let (outbound, session_inbox) = mailbox();
    let (outbox, background_inbox) = mailbox();
    let incoming = IncomingPort {
        port: SessionPort {
            id,
            name: name.to_string(),
            outbound,
        },
        inbox: background_inbox,
    };
    let end = SessionEnd {
        id,
        outbox,
        inbox: session_inbox,
    };
    (incoming, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn init_message_uses_wire_names() {
        let message = SessionMessage::Init { page_id: PageId(7) };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({"name": "init", "pageId": 7}));
        assert_eq!(serde_json::from_value::<SessionMessage>(value).unwrap(), message);
    }

    #[tokio::test]
    async fn dropping_either_end_is_observed_by_the_other() {
        let (incoming, end) = port_pair("panel");
        let IncomingPort { port, mut inbox } = incoming;
        assert_eq!(port.id(), end.id());

        drop(end);
        assert!(inbox.recv().await.is_none());
        assert!(port.is_closed());

        let (incoming, mut end) = port_pair("panel");
        drop(incoming);
        assert!(end.recv().await.is_none());
        assert_eq!(
            end.post(SessionMessage::Init { page_id: PageId(1) }),
            Err(RelayError::Unreachable)
        );
    }
}
