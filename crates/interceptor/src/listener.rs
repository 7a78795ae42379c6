//! Event listeners and identity-keyed adapter tracking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Event delivered to message listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    /// Channel the event was dispatched on (`message` unless the record named one).
    pub event_type: String,
    pub data: String,
    pub origin: String,
    pub last_event_id: String,
}

impl MessageEvent {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            origin: String::new(),
            last_event_id: String::new(),
        }
    }
}

/// Event delivered to `onerror`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorEvent {
    pub reason: String,
}

pub type ErrorHandler = Arc<dyn Fn(&ErrorEvent) + Send + Sync>;

/// Object-style listener (`{ handleEvent(event) { .. } }`).
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &MessageEvent);
}

/// A listener in either accepted form. Identity is the identity of the shared allocation,
/// so clones of one listener compare equal and two separately created listeners never do.
#[derive(Clone)]
pub enum Listener {
    Function(Arc<dyn Fn(&MessageEvent) + Send + Sync>),
    Handler(Arc<dyn EventHandler>),
}

impl Listener {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&MessageEvent) + Send + Sync + 'static,
    {
        Listener::Function(Arc::new(f))
    }

    pub fn handler(handler: Arc<dyn EventHandler>) -> Self {
        Listener::Handler(handler)
    }

    pub fn invoke(&self, event: &MessageEvent) {
        match self {
            Listener::Function(f) => f(event),
            Listener::Handler(handler) => handler.handle_event(event),
        }
    }

    pub fn key(&self) -> ListenerKey {
        let addr = match self {
            Listener::Function(f) => Arc::as_ptr(f) as *const () as usize,
            Listener::Handler(handler) => Arc::as_ptr(handler) as *const () as usize,
        };
        ListenerKey(addr)
    }

    pub fn is(&self, other: &Listener) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let form = match self {
            Listener::Function(_) => "function",
            Listener::Handler(_) => "handler",
        };
        f.debug_struct("Listener")
            .field("form", &form)
            .field("key", &self.key())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListenerKey(usize);

struct Tracked {
    // Held so the allocation, and therefore the key, stays unique while tracked.
    _listener: Listener,
    adapters: HashMap<String, Listener>,
}

/// Maps `(listener identity, channel)` to the adapter registered in its place.
#[derive(Default)]
pub struct AdapterTable {
    entries: HashMap<ListenerKey, Tracked>,
}

impl AdapterTable {
    pub fn get(&self, listener: &Listener, channel: &str) -> Option<Listener> {
        self.entries
            .get(&listener.key())
            .and_then(|tracked| tracked.adapters.get(channel))
            .cloned()
    }

    pub fn insert(&mut self, listener: &Listener, channel: &str, adapter: Listener) {
        self.entries
            .entry(listener.key())
            .or_insert_with(|| Tracked {
                _listener: listener.clone(),
                adapters: HashMap::new(),
            })
            .adapters
            .insert(channel.to_string(), adapter);
    }

    pub fn remove(&mut self, listener: &Listener, channel: &str) -> Option<Listener> {
        let key = listener.key();
        let tracked = self.entries.get_mut(&key)?;
        let adapter = tracked.adapters.remove(channel);
        if tracked.adapters.is_empty() {
            self.entries.remove(&key);
        }
        adapter
    }

    /// Number of adapters currently tracked across all listeners.
    pub fn len(&self) -> usize {
        self.entries.values().map(|tracked| tracked.adapters.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity_and_distinct_listeners_do_not() {
        let a = Listener::function(|_| {});
        let b = Listener::function(|_| {});
        assert!(a.is(&a.clone()));
        assert!(!a.is(&b));
    }

    #[test]
    fn table_is_keyed_by_listener_and_channel() {
        let listener = Listener::function(|_| {});
        let adapter_x = Listener::function(|_| {});
        let adapter_y = Listener::function(|_| {});
        let mut table = AdapterTable::default();

        table.insert(&listener, "x", adapter_x.clone());
        table.insert(&listener, "y", adapter_y.clone());
        assert_eq!(table.len(), 2);
        assert!(table.get(&listener, "x").unwrap().is(&adapter_x));
        assert!(table.get(&listener, "z").is_none());

        assert!(table.remove(&listener, "x").unwrap().is(&adapter_x));
        assert!(table.remove(&listener, "x").is_none());
        assert!(!table.is_empty());
        assert!(table.remove(&listener, "y").unwrap().is(&adapter_y));
        assert!(table.is_empty());
    }
}
