use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use streamscope_core_types::{CaptureEvent, PageId, StreamId, StreamMessage};
use streamscope_registry::{
    BackgroundRouter, NoopInjector, RegistryConfig, RouterHandle, ScriptInjector, SessionRegistry,
};
use streamscope_relay::{
    ExtensionRuntime, InjectError, MessageSender, SessionEnd, SessionMessage,
};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

fn start(runtime: &ExtensionRuntime, injector: Arc<dyn ScriptInjector>) -> RouterHandle {
    BackgroundRouter::spawn(
        runtime.start_background(),
        Arc::new(SessionRegistry::new()),
        injector,
        RegistryConfig::default(),
    )
}

fn message(data: &str) -> CaptureEvent {
    CaptureEvent::EsMessage(StreamMessage {
        id: StreamId::new(),
        event_type: "message".into(),
        data: data.into(),
        time: 0,
    })
}

fn from(page: u64) -> MessageSender {
    MessageSender {
        page: Some(PageId(page)),
    }
}

async fn eventually<F: Fn() -> bool>(check: F) {
    timeout(WAIT, async {
        while !check() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn announce(runtime: &ExtensionRuntime, handle: &RouterHandle, page: u64) -> SessionEnd {
    let session = runtime.connect("panel").unwrap();
    session
        .post(SessionMessage::Init {
            page_id: PageId(page),
        })
        .unwrap();
    let registry = Arc::clone(handle.registry());
    let port = session.id();
    eventually(move || {
        registry
            .connection(PageId(page))
            .map(|connection| connection.port.id() == port)
            .unwrap_or(false)
    })
    .await;
    session
}

fn data(event: Option<CaptureEvent>) -> String {
    match event {
        Some(CaptureEvent::EsMessage(message)) => message.data,
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn events_reach_only_the_session_of_their_page() {
    let runtime = ExtensionRuntime::new();
    let handle = start(&runtime, Arc::new(NoopInjector));
    let mut one = announce(&runtime, &handle, 1).await;
    let mut two = announce(&runtime, &handle, 2).await;

    runtime.send_message(from(1), message("a")).unwrap();
    runtime.send_message(from(2), message("b")).unwrap();
    runtime.send_message(from(1), message("c")).unwrap();

    assert_eq!(data(timeout(WAIT, one.recv()).await.unwrap()), "a");
    assert_eq!(data(timeout(WAIT, one.recv()).await.unwrap()), "c");
    assert_eq!(data(timeout(WAIT, two.recv()).await.unwrap()), "b");
    assert!(timeout(Duration::from_millis(50), two.recv()).await.is_err());
}

#[tokio::test]
async fn unroutable_events_are_dropped_without_disturbing_others() {
    let runtime = ExtensionRuntime::new();
    let handle = start(&runtime, Arc::new(NoopInjector));
    let mut one = announce(&runtime, &handle, 1).await;

    runtime.send_message(from(99), message("nobody")).unwrap();
    runtime
        .send_message(MessageSender::default(), message("anonymous"))
        .unwrap();
    runtime.send_message(from(1), message("kept")).unwrap();

    assert_eq!(data(timeout(WAIT, one.recv()).await.unwrap()), "kept");
}

#[tokio::test]
async fn re_announce_moves_routing_to_the_new_channel() {
    let runtime = ExtensionRuntime::new();
    let handle = start(&runtime, Arc::new(NoopInjector));
    let mut old = announce(&runtime, &handle, 5).await;
    let mut new = announce(&runtime, &handle, 5).await;
    assert_eq!(handle.registry().len(), 1);

    runtime.send_message(from(5), message("fresh")).unwrap();
    assert_eq!(data(timeout(WAIT, new.recv()).await.unwrap()), "fresh");
    assert!(timeout(Duration::from_millis(50), old.recv()).await.is_err());

    // The superseded channel closing later must not evict its replacement.
    drop(old);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(
        handle.registry().connection(PageId(5)).unwrap().port.id(),
        new.id()
    );
}

#[tokio::test]
async fn disconnect_removes_the_connection() {
    let runtime = ExtensionRuntime::new();
    let handle = start(&runtime, Arc::new(NoopInjector));
    let session = announce(&runtime, &handle, 8).await;

    drop(session);
    let registry = Arc::clone(handle.registry());
    eventually(move || registry.is_empty()).await;
}

#[tokio::test]
async fn shutdown_disconnects_every_session() {
    let runtime = ExtensionRuntime::new();
    let handle = start(&runtime, Arc::new(NoopInjector));
    let mut one = announce(&runtime, &handle, 1).await;
    let mut two = announce(&runtime, &handle, 2).await;
    let registry = Arc::clone(handle.registry());

    handle.shutdown().await.unwrap();
    assert!(registry.is_empty());
    assert_eq!(timeout(WAIT, one.recv()).await.unwrap(), None);
    assert_eq!(timeout(WAIT, two.recv()).await.unwrap(), None);
    assert!(!runtime.is_background_alive());
}

struct RefusingInjector {
    calls: AtomicUsize,
}

#[async_trait]
impl ScriptInjector for RefusingInjector {
    async fn inject(&self, page: PageId) -> Result<(), InjectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(InjectError::Forbidden(page))
    }
}

#[tokio::test]
async fn announce_reinjects_and_swallows_failures() {
    let runtime = ExtensionRuntime::new();
    let injector = Arc::new(RefusingInjector {
        calls: AtomicUsize::new(0),
    });
    let handle = start(&runtime, injector.clone());
    let mut session = announce(&runtime, &handle, 3).await;

    let seen = injector.clone();
    eventually(move || seen.calls.load(Ordering::SeqCst) == 1).await;

    runtime.send_message(from(3), message("still routed")).unwrap();
    assert_eq!(
        data(timeout(WAIT, session.recv()).await.unwrap()),
        "still routed"
    );
}
