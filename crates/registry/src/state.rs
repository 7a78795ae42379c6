use dashmap::DashMap;
use streamscope_core_types::{now_millis, CaptureEvent, PageId, PortId};
use streamscope_relay::SessionPort;
use tracing::{debug, warn};

use crate::{errors::RouteError, metrics, model::Connection};

/// Page-to-channel table kept by the background context. At most one connection per page;
/// the most recent announcement wins.
#[derive(Default)]
pub struct SessionRegistry {
    connections: DashMap<PageId, Connection>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `page` to `port`, returning the channel it superseded, if any. The superseded
    /// channel is forgotten, not closed: its session finds out when its own side drops.
    pub fn register(&self, page: PageId, port: SessionPort) -> Option<SessionPort> {
        let connection = Connection {
            page,
            port,
            registered_at: now_millis(),
        };
        let previous = self.connections.insert(page, connection);
        metrics::set_connection_count(self.connections.len());
        let previous = previous.map(|previous| previous.port);
        if let Some(previous) = &previous {
            debug!(page = %page, superseded = %previous.id(), "session channel replaced");
        }
        previous
    }

    /// Remove the entry held by `port`. A channel that was already superseded matches
    /// nothing, so a late disconnect never evicts its replacement.
    pub fn unregister(&self, port: &PortId) -> Option<PageId> {
        let page = self
            .connections
            .iter()
            .find(|entry| entry.value().port.id() == *port)
            .map(|entry| *entry.key())?;
        let removed = self
            .connections
            .remove_if(&page, |_, connection| connection.port.id() == *port)
            .map(|(page, _)| page);
        metrics::set_connection_count(self.connections.len());
        removed
    }

    /// Deliver `event` to the session inspecting `page`.
    pub fn route_to(&self, page: PageId, event: CaptureEvent) -> Result<(), RouteError> {
        let port = match self.connections.get(&page) {
            Some(entry) => entry.value().port.clone(),
            None => {
                warn!(page = %page, kind = event.kind(), "page not found in connection list");
                return Err(RouteError::NoSession(page));
            }
        };
        port.post(event).map_err(|err| {
            debug!(page = %page, port = %port.id(), error = %err, "session channel rejected event");
            RouteError::ChannelClosed(page)
        })
    }

    pub fn connection(&self, page: PageId) -> Option<Connection> {
        self.connections.get(&page).map(|entry| entry.value().clone())
    }

    pub fn pages(&self) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self.connections.iter().map(|entry| *entry.key()).collect();
        pages.sort();
        pages
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Forget every connection, dropping the background's side of each channel.
    pub fn clear(&self) {
        self.connections.clear();
        metrics::set_connection_count(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamscope_core_types::{StreamFault, StreamId};
    use streamscope_relay::{port_pair, IncomingPort, SessionEnd};

    fn channel() -> (SessionPort, SessionEnd) {
        let (incoming, end) = port_pair("panel");
        let IncomingPort { port, .. } = incoming;
        (port, end)
    }

    fn event() -> CaptureEvent {
        CaptureEvent::EsError(StreamFault {
            id: StreamId::new(),
            time: 0,
        })
    }

    #[tokio::test]
    async fn re_announce_replaces_and_routes_to_new_channel_only() {
        let registry = SessionRegistry::new();
        let (old_port, mut old_end) = channel();
        let (new_port, mut new_end) = channel();

        assert!(registry.register(PageId(1), old_port.clone()).is_none());
        let superseded = registry.register(PageId(1), new_port.clone()).unwrap();
        assert_eq!(superseded.id(), old_port.id());
        assert_eq!(registry.len(), 1);

        let sent = event();
        registry.route_to(PageId(1), sent.clone()).unwrap();
        assert_eq!(new_end.recv().await, Some(sent));
        drop(old_port);
        drop(superseded);
        assert!(old_end.recv().await.is_none());
    }

    #[test]
    fn stale_disconnect_does_not_evict_replacement() {
        let registry = SessionRegistry::new();
        let (old_port, _old_end) = channel();
        let (new_port, _new_end) = channel();
        registry.register(PageId(2), old_port.clone());
        registry.register(PageId(2), new_port.clone());

        assert_eq!(registry.unregister(&old_port.id()), None);
        assert_eq!(registry.connection(PageId(2)).unwrap().port.id(), new_port.id());
        assert_eq!(registry.unregister(&new_port.id()), Some(PageId(2)));
        assert!(registry.is_empty());
    }

    #[test]
    fn routing_reports_missing_and_closed_sessions() {
        let registry = SessionRegistry::new();
        assert_eq!(
            registry.route_to(PageId(3), event()),
            Err(RouteError::NoSession(PageId(3)))
        );

        let (port, end) = channel();
        registry.register(PageId(3), port);
        drop(end);
        assert_eq!(
            registry.route_to(PageId(3), event()),
            Err(RouteError::ChannelClosed(PageId(3)))
        );
    }

    #[test]
    fn pages_are_isolated() {
        let registry = SessionRegistry::new();
        let (a, _a_end) = channel();
        let (b, _b_end) = channel();
        registry.register(PageId(10), a);
        registry.register(PageId(11), b);
        assert_eq!(registry.pages(), vec![PageId(10), PageId(11)]);

        registry.clear();
        assert!(registry.is_empty());
    }
}
