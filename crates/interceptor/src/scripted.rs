//! Scripted stand-ins for the native EventSource and fetch, plus a collecting sink.
//!
//! Used by the test suites of every StreamScope crate and by the `replay` command, which feeds
//! a recorded body through a page without any network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use parking_lot::{Mutex, RwLock};
use streamscope_core_types::{CaptureEvent, CaptureSink};
use tokio::sync::Notify;

use crate::body::{Body, BodyFeed};
use crate::event_source::{
    ConstructError, EventSourceInit, NativeEventSource, NativeEventSourceClass, Prototype,
    ReadyStateConstants,
};
use crate::fetch::{resolve_target, FetchError, NativeFetch, RequestInit, Resource, Response};
use crate::listener::{ErrorEvent, ErrorHandler, Listener, MessageEvent};

pub struct ScriptedEventSourceClass {
    prototype: Prototype,
    instances: Mutex<Vec<Arc<ScriptedEventSource>>>,
}

impl ScriptedEventSourceClass {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            prototype: Prototype::new("EventSource"),
            instances: Mutex::new(Vec::new()),
        })
    }

    /// Every native instance constructed so far, oldest first.
    pub fn instances(&self) -> Vec<Arc<ScriptedEventSource>> {
        self.instances.lock().clone()
    }

    pub fn last(&self) -> Option<Arc<ScriptedEventSource>> {
        self.instances.lock().last().cloned()
    }
}

impl NativeEventSourceClass for ScriptedEventSourceClass {
    fn construct(
        &self,
        url: &str,
        init: EventSourceInit,
    ) -> Result<Arc<dyn NativeEventSource>, ConstructError> {
        if !url.contains("://") {
            return Err(ConstructError::InvalidUrl(url.to_string()));
        }
        let instance = Arc::new(ScriptedEventSource {
            url: url.to_string(),
            with_credentials: init.with_credentials,
            state: AtomicU16::new(ReadyStateConstants::default().connecting),
            prototype: self.prototype.clone(),
            listeners: Mutex::new(Vec::new()),
            onmessage: RwLock::new(None),
            onerror: RwLock::new(None),
        });
        self.instances.lock().push(Arc::clone(&instance));
        Ok(instance)
    }

    fn statics(&self) -> ReadyStateConstants {
        ReadyStateConstants::default()
    }

    fn prototype(&self) -> Prototype {
        self.prototype.clone()
    }

    fn native_source(&self) -> String {
        "function EventSource() { [native code] }".to_string()
    }
}

/// Native instance whose traffic is driven by the test.
pub struct ScriptedEventSource {
    url: String,
    with_credentials: bool,
    state: AtomicU16,
    prototype: Prototype,
    listeners: Mutex<Vec<(String, Listener)>>,
    onmessage: RwLock<Option<Listener>>,
    onerror: RwLock<Option<ErrorHandler>>,
}

impl ScriptedEventSource {
    pub fn open(&self) {
        self.state
            .store(ReadyStateConstants::default().open, Ordering::SeqCst);
    }

    /// Deliver a server event on `channel`, as the browser would.
    pub fn dispatch(&self, channel: &str, data: &str) {
        let event = MessageEvent::new(channel, data);
        let targets: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(registered, _)| registered == channel)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in targets {
            listener.invoke(&event);
        }
        if channel == "message" {
            let handler = self.onmessage.read().clone();
            if let Some(handler) = handler {
                handler.invoke(&event);
            }
        }
    }

    /// Report a connection error through `onerror`.
    pub fn fail(&self, reason: &str) {
        let handler = self.onerror.read().clone();
        if let Some(handler) = handler {
            handler(&ErrorEvent {
                reason: reason.to_string(),
            });
        }
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|(registered, _)| registered == channel)
            .count()
    }
}

impl NativeEventSource for ScriptedEventSource {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn with_credentials(&self) -> bool {
        self.with_credentials
    }

    fn ready_state(&self) -> u16 {
        self.state.load(Ordering::SeqCst)
    }

    fn prototype(&self) -> Prototype {
        self.prototype.clone()
    }

    fn add_event_listener(&self, channel: &str, listener: Listener) {
        let mut listeners = self.listeners.lock();
        let duplicate = listeners
            .iter()
            .any(|(registered, existing)| registered == channel && existing.is(&listener));
        if !duplicate {
            listeners.push((channel.to_string(), listener));
        }
    }

    fn remove_event_listener(&self, channel: &str, listener: &Listener) {
        self.listeners
            .lock()
            .retain(|(registered, existing)| !(registered == channel && existing.is(listener)));
    }

    fn onmessage(&self) -> Option<Listener> {
        self.onmessage.read().clone()
    }

    fn set_onmessage(&self, handler: Option<Listener>) {
        *self.onmessage.write() = handler;
    }

    fn onerror(&self) -> Option<ErrorHandler> {
        self.onerror.read().clone()
    }

    fn set_onerror(&self, handler: Option<ErrorHandler>) {
        *self.onerror.write() = handler;
    }

    fn close(&self) {
        self.state
            .store(ReadyStateConstants::default().closed, Ordering::SeqCst);
    }
}

enum Route {
    Respond {
        status: StatusCode,
        content_type: String,
        chunks: Vec<Bytes>,
        delay: Option<Duration>,
    },
    Feed {
        content_type: String,
        body: Option<Body>,
    },
    Fail(FetchError),
}

/// fetch double answering from a route table keyed by URL.
#[derive(Default)]
pub struct ScriptedFetch {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedFetch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond<I, B>(&self, url: &str, content_type: &str, chunks: I)
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.insert(
            url,
            Route::Respond {
                status: StatusCode::OK,
                content_type: content_type.to_string(),
                chunks: chunks.into_iter().map(Into::into).collect(),
                delay: None,
            },
        );
    }

    /// Like [`respond`](Self::respond) but each chunk arrives after `delay`.
    pub fn respond_slowly<I, B>(&self, url: &str, content_type: &str, chunks: I, delay: Duration)
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.insert(
            url,
            Route::Respond {
                status: StatusCode::OK,
                content_type: content_type.to_string(),
                chunks: chunks.into_iter().map(Into::into).collect(),
                delay: Some(delay),
            },
        );
    }

    /// Serve one response whose body is pushed through the returned feed.
    pub fn feed(&self, url: &str, content_type: &str) -> BodyFeed {
        let (feed, body) = Body::channel();
        self.insert(
            url,
            Route::Feed {
                content_type: content_type.to_string(),
                body: Some(body),
            },
        );
        feed
    }

    pub fn fail(&self, url: &str, error: FetchError) {
        self.insert(url, Route::Fail(error));
    }

    /// `(url, method)` of every call seen, in order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }

    fn insert(&self, url: &str, route: Route) {
        self.routes.lock().insert(url.to_string(), route);
    }
}

fn response(url: &str, status: StatusCode, content_type: &str, body: Body) -> Response {
    let mut response = Response::new(status, url).with_body(body);
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers.insert(CONTENT_TYPE, value);
    }
    response
}

#[async_trait]
impl NativeFetch for ScriptedFetch {
    async fn fetch(
        &self,
        resource: Resource,
        init: Option<RequestInit>,
    ) -> Result<Response, FetchError> {
        let (url, method) = resolve_target(&resource, init.as_ref());
        self.requests.lock().push((url.clone(), method));

        let mut routes = self.routes.lock();
        match routes.get_mut(&url) {
            None => Err(FetchError::Network(format!("no route for {url}"))),
            Some(Route::Fail(error)) => Err(error.clone()),
            Some(Route::Feed { content_type, body }) => match body.take() {
                Some(body) => Ok(response(&url, StatusCode::OK, content_type, body)),
                None => Err(FetchError::Network(format!("{url} already consumed"))),
            },
            Some(Route::Respond {
                status,
                content_type,
                chunks,
                delay,
            }) => {
                let chunks = chunks.clone();
                let body = match *delay {
                    None => Body::from_chunks(chunks),
                    Some(delay) => Body::from_stream(futures::stream::iter(chunks).then(
                        move |chunk| async move {
                            tokio::time::sleep(delay).await;
                            Ok(chunk)
                        },
                    )),
                };
                Ok(response(&url, *status, content_type, body))
            }
        }
    }
}

/// Sink that keeps every event, for assertions.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<CaptureEvent>>,
    notify: Notify,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<CaptureEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(CaptureEvent::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Wait until `done` holds for the collected events or `limit` passes.
    pub async fn wait_until<F>(&self, limit: Duration, done: F) -> bool
    where
        F: Fn(&[CaptureEvent]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let notified = self.notify.notified();
            if done(&self.events.lock()) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return done(&self.events.lock());
            }
        }
    }
}

impl CaptureSink for CollectingSink {
    fn emit(&self, event: CaptureEvent) {
        self.events.lock().push(event);
        self.notify.notify_waiters();
    }
}
