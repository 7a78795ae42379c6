use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use stream_interceptor::scripted::{CollectingSink, ScriptedEventSourceClass, ScriptedFetch};
use stream_interceptor::{
    install_with_sink, instance_of, ConstructError, ErrorEvent, EventHandler, EventSourceInit,
    InstallOutcome, InterceptedEventSource, InterceptorConfig, Listener, MessageEvent,
    NativeEventSource, NativeEventSourceClass, PageWindow,
};
use streamscope_core_types::CaptureEvent;

struct Fixture {
    window: Arc<PageWindow>,
    native: Arc<ScriptedEventSourceClass>,
    sink: Arc<CollectingSink>,
}

fn fixture() -> Fixture {
    let native = ScriptedEventSourceClass::new();
    let window = PageWindow::new(native.clone(), ScriptedFetch::new());
    let sink = CollectingSink::new();
    assert_eq!(
        install_with_sink(&window, sink.clone(), &InterceptorConfig::default()),
        InstallOutcome::Installed
    );
    Fixture {
        window,
        native,
        sink,
    }
}

fn counter() -> (Listener, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = hits.clone();
    let listener = Listener::function(move |_: &MessageEvent| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (listener, hits)
}

fn messages(sink: &CollectingSink) -> Vec<(String, String)> {
    sink.events()
        .into_iter()
        .filter_map(|event| match event {
            CaptureEvent::EsMessage(message) => Some((message.event_type, message.data)),
            _ => None,
        })
        .collect()
}

#[test]
fn construction_emits_connect_before_any_data() {
    let fx = fixture();
    let es = fx
        .window
        .event_source()
        .construct("https://api.test/events", EventSourceInit::default())
        .unwrap();

    let events = fx.sink.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        CaptureEvent::EsConnect(open) => {
            assert_eq!(open.url, "https://api.test/events");
            assert_eq!(open.method, None);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(es.url(), "https://api.test/events");
}

#[test]
fn default_channel_is_reported_once_even_with_page_listener() {
    let fx = fixture();
    let es = fx
        .window
        .event_source()
        .construct("https://api.test/events", EventSourceInit::default())
        .unwrap();
    let (listener, hits) = counter();
    es.add_event_listener("message", listener);

    fx.native.last().unwrap().dispatch("message", "hello");

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(messages(&fx.sink), vec![("message".into(), "hello".into())]);
}

#[test]
fn named_channels_are_reported_and_delivered() {
    let fx = fixture();
    let es = fx
        .window
        .event_source()
        .construct("https://api.test/events", EventSourceInit::default())
        .unwrap();
    let (listener, hits) = counter();
    es.add_event_listener("delta", listener);

    let native = fx.native.last().unwrap();
    native.dispatch("delta", "{\"n\":1}");
    native.dispatch("other", "ignored");

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(messages(&fx.sink), vec![("delta".into(), "{\"n\":1}".into())]);
}

#[test]
fn re_registration_is_idempotent_and_removal_leaves_nothing_behind() {
    let fx = fixture();
    let es = fx
        .window
        .event_source()
        .construct("https://api.test/events", EventSourceInit::default())
        .unwrap();
    let native = fx.native.last().unwrap();
    let (listener, hits) = counter();

    es.add_event_listener("delta", listener.clone());
    es.add_event_listener("delta", listener.clone());
    assert_eq!(native.listener_count("delta"), 1);

    native.dispatch("delta", "x");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    es.remove_event_listener("delta", &listener);
    assert_eq!(native.listener_count("delta"), 0);
    native.dispatch("delta", "y");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    es.add_event_listener("delta", listener.clone());
    native.dispatch("delta", "z");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn adapters_are_released_when_their_listeners_are_removed() {
    let fx = fixture();
    let native = fx
        .native
        .construct("https://api.test/events", EventSourceInit::default())
        .unwrap();
    let es = InterceptedEventSource::attach(native, "https://api.test/events", fx.sink.clone());
    let (first, _) = counter();
    let (second, _) = counter();

    es.add_event_listener("delta", first.clone());
    es.add_event_listener("delta", first.clone());
    es.add_event_listener("delta", second.clone());
    es.add_event_listener("gamma", first.clone());
    assert_eq!(es.tracked_adapters(), 3);

    es.remove_event_listener("delta", &first);
    assert_eq!(es.tracked_adapters(), 2);
    es.remove_event_listener("delta", &second);
    es.remove_event_listener("gamma", &first);
    assert_eq!(es.tracked_adapters(), 0);

    let scripted = fx.native.last().unwrap();
    assert_eq!(scripted.listener_count("delta"), 0);
    assert_eq!(scripted.listener_count("gamma"), 0);
}

#[test]
fn removing_untracked_listener_passes_through() {
    let fx = fixture();
    let es = fx
        .window
        .event_source()
        .construct("https://api.test/events", EventSourceInit::default())
        .unwrap();
    let native = fx.native.last().unwrap();
    let (listener, hits) = counter();

    // Only the interceptor's own default-channel spy is registered.
    assert_eq!(native.listener_count("message"), 1);
    es.remove_event_listener("message", &listener);
    assert_eq!(native.listener_count("message"), 1);

    // Registered on the native instance behind the wrapper's back.
    native.add_event_listener("delta", listener.clone());
    assert_eq!(native.listener_count("delta"), 1);
    es.remove_event_listener("delta", &listener);
    assert_eq!(native.listener_count("delta"), 0);

    native.dispatch("delta", "x");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn object_listeners_are_wrapped_too() {
    struct Recorder(Mutex<Vec<String>>);
    impl EventHandler for Recorder {
        fn handle_event(&self, event: &MessageEvent) {
            self.0.lock().push(event.data.clone());
        }
    }

    let fx = fixture();
    let es = fx
        .window
        .event_source()
        .construct("https://api.test/events", EventSourceInit::default())
        .unwrap();
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    es.add_event_listener("tick", Listener::handler(recorder.clone()));

    fx.native.last().unwrap().dispatch("tick", "1");

    assert_eq!(*recorder.0.lock(), vec!["1".to_string()]);
    assert_eq!(messages(&fx.sink), vec![("tick".into(), "1".into())]);
}

#[test]
fn errors_are_reported_and_page_handler_still_runs() {
    let fx = fixture();
    let es = fx
        .window
        .event_source()
        .construct("https://api.test/events", EventSourceInit::default())
        .unwrap();
    let called = Arc::new(AtomicUsize::new(0));
    let seen = called.clone();
    es.set_onerror(Some(Arc::new(move |_: &ErrorEvent| {
        seen.fetch_add(1, Ordering::SeqCst);
    })));
    assert!(es.onerror().is_some());

    fx.native.last().unwrap().fail("network down");

    assert_eq!(called.load(Ordering::SeqCst), 1);
    assert_eq!(fx.sink.kinds(), vec!["es-connect", "es-error"]);
}

#[test]
fn wrapper_keeps_native_identity() {
    let fx = fixture();
    let wrapped = fx.window.event_source();

    assert_eq!(wrapped.statics(), fx.native.statics());
    assert_eq!(wrapped.statics().closed, 2);
    assert_eq!(wrapped.prototype(), fx.native.prototype());
    assert_eq!(wrapped.native_source(), fx.native.native_source());

    let es = wrapped
        .construct("https://api.test/events", EventSourceInit::default())
        .unwrap();
    assert!(instance_of(es.as_ref(), fx.native.as_ref()));
    assert!(instance_of(es.as_ref(), wrapped.as_ref()));
}

#[test]
fn constructor_errors_propagate_without_capture() {
    let fx = fixture();
    let err = fx
        .window
        .event_source()
        .construct("not a url", EventSourceInit::default())
        .err()
        .unwrap();
    assert_eq!(err, ConstructError::InvalidUrl("not a url".into()));
    assert!(fx.sink.is_empty());
}

#[test]
fn second_install_does_not_wrap_twice() {
    let fx = fixture();
    assert_eq!(
        install_with_sink(&fx.window, fx.sink.clone(), &InterceptorConfig::default()),
        InstallOutcome::AlreadyInstalled
    );

    let es = fx
        .window
        .event_source()
        .construct("https://api.test/events", EventSourceInit::default())
        .unwrap();
    fx.native.last().unwrap().dispatch("message", "once");
    drop(es);
    assert_eq!(fx.sink.kinds(), vec!["es-connect", "es-message"]);
}
