//! EventSource capability surface and its intercepting wrapper.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use streamscope_core_types::{
    now_millis, CaptureEvent, CaptureSink, StreamFault, StreamId, StreamMessage, StreamOpened,
    DEFAULT_EVENT_TYPE,
};
use thiserror::Error;
use tracing::debug;

use crate::listener::{AdapterTable, ErrorEvent, ErrorHandler, Listener, MessageEvent};

/// `readyState` values exposed as class-level constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadyStateConstants {
    pub connecting: u16,
    pub open: u16,
    pub closed: u16,
}

impl Default for ReadyStateConstants {
    fn default() -> Self {
        Self {
            connecting: 0,
            open: 1,
            closed: 2,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventSourceInit {
    pub with_credentials: bool,
}

/// Prototype identity. Two handles are the same prototype only if they share the allocation.
#[derive(Clone)]
pub struct Prototype(Arc<str>);

impl Prototype {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Prototype {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Prototype {}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prototype({})", self.0)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConstructError {
    #[error("SyntaxError: invalid url {0:?}")]
    InvalidUrl(String),
    #[error("SecurityError: {0}")]
    Security(String),
}

/// Instance surface of an event-stream connection.
pub trait NativeEventSource: Send + Sync {
    fn url(&self) -> String;
    fn with_credentials(&self) -> bool;
    fn ready_state(&self) -> u16;
    fn prototype(&self) -> Prototype;
    fn add_event_listener(&self, channel: &str, listener: Listener);
    fn remove_event_listener(&self, channel: &str, listener: &Listener);
    fn onmessage(&self) -> Option<Listener>;
    fn set_onmessage(&self, handler: Option<Listener>);
    fn onerror(&self) -> Option<ErrorHandler>;
    fn set_onerror(&self, handler: Option<ErrorHandler>);
    fn close(&self);
}

/// Class surface: construction, static constants, prototype and string form.
pub trait NativeEventSourceClass: Send + Sync {
    fn construct(
        &self,
        url: &str,
        init: EventSourceInit,
    ) -> Result<Arc<dyn NativeEventSource>, ConstructError>;
    fn statics(&self) -> ReadyStateConstants;
    fn prototype(&self) -> Prototype;
    /// The function's `toString()` output.
    fn native_source(&self) -> String;
}

/// `instanceof` as the page would evaluate it.
pub fn instance_of(instance: &dyn NativeEventSource, class: &dyn NativeEventSourceClass) -> bool {
    instance.prototype() == class.prototype()
}

/// Drop-in replacement for the page's EventSource binding.
pub struct InterceptedEventSourceClass {
    native: Arc<dyn NativeEventSourceClass>,
    sink: Arc<dyn CaptureSink>,
}

impl InterceptedEventSourceClass {
    pub fn new(native: Arc<dyn NativeEventSourceClass>, sink: Arc<dyn CaptureSink>) -> Self {
        Self { native, sink }
    }

    pub fn native(&self) -> &Arc<dyn NativeEventSourceClass> {
        &self.native
    }
}

impl NativeEventSourceClass for InterceptedEventSourceClass {
    fn construct(
        &self,
        url: &str,
        init: EventSourceInit,
    ) -> Result<Arc<dyn NativeEventSource>, ConstructError> {
        let instance = self.native.construct(url, init)?;
        Ok(InterceptedEventSource::attach(instance, url, Arc::clone(&self.sink)))
    }

    fn statics(&self) -> ReadyStateConstants {
        self.native.statics()
    }

    fn prototype(&self) -> Prototype {
        self.native.prototype()
    }

    fn native_source(&self) -> String {
        self.native.native_source()
    }
}

/// One observed connection. Delegates the whole instance surface to the native object and
/// only changes listener registration and error handling.
pub struct InterceptedEventSource {
    id: StreamId,
    native: Arc<dyn NativeEventSource>,
    sink: Arc<dyn CaptureSink>,
    adapters: Mutex<AdapterTable>,
    page_onerror: Arc<RwLock<Option<ErrorHandler>>>,
}

impl InterceptedEventSource {
    /// Wrap a freshly constructed native instance: announce the connection, spy on the default
    /// channel and hook error reporting.
    pub fn attach(
        native: Arc<dyn NativeEventSource>,
        url: &str,
        sink: Arc<dyn CaptureSink>,
    ) -> Arc<Self> {
        let id = StreamId::new();
        sink.emit(CaptureEvent::EsConnect(StreamOpened {
            id,
            url: url.to_string(),
            method: None,
            start_time: now_millis(),
        }));

        let spy_sink = Arc::clone(&sink);
        native.add_event_listener(
            DEFAULT_EVENT_TYPE,
            Listener::function(move |event: &MessageEvent| {
                spy_sink.emit(CaptureEvent::EsMessage(StreamMessage {
                    id,
                    event_type: DEFAULT_EVENT_TYPE.to_string(),
                    data: event.data.clone(),
                    time: now_millis(),
                }));
            }),
        );

        let page_onerror = Arc::new(RwLock::new(native.onerror()));
        let hook_sink = Arc::clone(&sink);
        let hook_page = Arc::clone(&page_onerror);
        native.set_onerror(Some(Arc::new(move |event: &ErrorEvent| {
            hook_sink.emit(CaptureEvent::EsError(StreamFault {
                id,
                time: now_millis(),
            }));
            let handler = hook_page.read().clone();
            if let Some(handler) = handler {
                handler(event);
            }
        })));

        debug!(stream = %id, url, "event source intercepted");
        Arc::new(Self {
            id,
            native,
            sink,
            adapters: Mutex::new(AdapterTable::default()),
            page_onerror,
        })
    }

    pub fn stream_id(&self) -> StreamId {
        self.id
    }

    /// Adapters currently tracked for page listeners.
    pub fn tracked_adapters(&self) -> usize {
        self.adapters.lock().len()
    }

    fn adapter_for(&self, channel: &str, listener: Listener) -> Listener {
        let id = self.id;
        let sink = Arc::clone(&self.sink);
        let channel = channel.to_string();
        Listener::function(move |event: &MessageEvent| {
            // The default channel is already reported by the spy attached in `attach`.
            if channel != DEFAULT_EVENT_TYPE {
                sink.emit(CaptureEvent::EsMessage(StreamMessage {
                    id,
                    event_type: channel.clone(),
                    data: event.data.clone(),
                    time: now_millis(),
                }));
            }
            listener.invoke(event);
        })
    }
}

impl NativeEventSource for InterceptedEventSource {
    fn url(&self) -> String {
        self.native.url()
    }

    fn with_credentials(&self) -> bool {
        self.native.with_credentials()
    }

    fn ready_state(&self) -> u16 {
        self.native.ready_state()
    }

    fn prototype(&self) -> Prototype {
        self.native.prototype()
    }

    fn add_event_listener(&self, channel: &str, listener: Listener) {
        let adapter = {
            let mut adapters = self.adapters.lock();
            match adapters.get(&listener, channel) {
                Some(existing) => existing,
                None => {
                    let adapter = self.adapter_for(channel, listener.clone());
                    adapters.insert(&listener, channel, adapter.clone());
                    adapter
                }
            }
        };
        self.native.add_event_listener(channel, adapter);
    }

    fn remove_event_listener(&self, channel: &str, listener: &Listener) {
        let adapter = self.adapters.lock().remove(listener, channel);
        match adapter {
            Some(adapter) => self.native.remove_event_listener(channel, &adapter),
            None => self.native.remove_event_listener(channel, listener),
        }
    }

    fn onmessage(&self) -> Option<Listener> {
        self.native.onmessage()
    }

    fn set_onmessage(&self, handler: Option<Listener>) {
        self.native.set_onmessage(handler);
    }

    fn onerror(&self) -> Option<ErrorHandler> {
        self.page_onerror.read().clone()
    }

    fn set_onerror(&self, handler: Option<ErrorHandler>) {
        *self.page_onerror.write() = handler;
    }

    fn close(&self) {
        self.native.close();
    }
}
