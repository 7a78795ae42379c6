//! Page-context interception of event-stream traffic.
//!
//! [`install`] swaps the page's `EventSource` and `fetch` bindings for observing wrappers.
//! Page-visible behaviour is unchanged: constructor results, statics, prototypes, listener
//! semantics, resolved responses and rejected errors all come from the native
//! implementations. Each observed stream produces [`CaptureEvent`]s which are posted on the
//! page window under the capture tag.
//!
//! [`CaptureEvent`]: streamscope_core_types::CaptureEvent

pub mod body;
pub mod classify;
pub mod config;
pub mod event_source;
pub mod fetch;
pub mod listener;
pub mod post;
pub mod scripted;
pub mod window;

use std::sync::Arc;

use streamscope_core_types::CaptureSink;
use tracing::{debug, info};

pub use body::{Body, BodyError, BodyFeed};
pub use classify::StreamContent;
pub use config::InterceptorConfig;
pub use event_source::{
    instance_of, ConstructError, EventSourceInit, InterceptedEventSource,
    InterceptedEventSourceClass, NativeEventSource, NativeEventSourceClass, Prototype,
    ReadyStateConstants,
};
pub use fetch::{
    FetchError, InterceptedFetch, NativeFetch, Request, RequestInit, Resource, Response,
};
pub use listener::{ErrorEvent, ErrorHandler, EventHandler, Listener, MessageEvent};
pub use post::WindowPoster;
pub use window::{PageWindow, WindowMessage};

/// Global marker set once the interceptor has wrapped a page's bindings.
pub const INSTALL_MARKER: &str = "__EVENT_STREAM_PRO_INSTALLED__";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyInstalled,
}

/// Install into `window`, posting capture events on the window itself.
pub fn install(window: &Arc<PageWindow>, config: &InterceptorConfig) -> InstallOutcome {
    let sink: Arc<dyn CaptureSink> = Arc::new(WindowPoster::new(window));
    install_with_sink(window, sink, config)
}

/// Install into `window`, emitting capture events into `sink`. A second call on the same
/// window is a no-op, so bindings are never wrapped twice.
pub fn install_with_sink(
    window: &PageWindow,
    sink: Arc<dyn CaptureSink>,
    config: &InterceptorConfig,
) -> InstallOutcome {
    if !window.mark(INSTALL_MARKER) {
        debug!(window = %window.id(), "interceptor already installed");
        return InstallOutcome::AlreadyInstalled;
    }

    let event_source = window.event_source();
    window.set_event_source(Arc::new(InterceptedEventSourceClass::new(
        event_source,
        Arc::clone(&sink),
    )));

    let fetch = window.fetch();
    window.set_fetch(Arc::new(InterceptedFetch::new(fetch, sink, config)));

    info!(
        window = %window.id(),
        raw_chunks = config.capture_raw_chunks,
        "event stream interceptor installed"
    );
    InstallOutcome::Installed
}
