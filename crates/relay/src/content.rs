//! The content context: listens on the page window and forwards tagged capture events to the
//! background, one message per event.

use std::sync::Arc;

use stream_interceptor::{InterceptorConfig, PageWindow, WindowMessage};
use streamscope_channel::RelayError;
use streamscope_core_types::{CaptureEnvelope, PageId, WindowId};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::runtime::{ExtensionRuntime, MessageSender};

/// Global marker set once a content context is attached to a page.
pub const CONTENT_MARKER: &str = "__EVENT_STREAM_DEVTOOLS_CS_INJECTED";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InjectError {
    #[error("cannot access contents of page {0}")]
    Forbidden(PageId),
    #[error("page {0} no longer exists")]
    PageGone(PageId),
}

#[derive(Debug)]
pub enum ContentInstall {
    /// A fresh content context; the handle runs its forwarding loop.
    Attached(JoinHandle<()>),
    AlreadyAttached,
}

/// Attach a content context to `window` and install the interceptor into it.
///
/// The window listener is registered before the interceptor, so no event the interceptor
/// emits can be posted ahead of it.
pub fn install(
    page: PageId,
    window: &Arc<PageWindow>,
    runtime: Arc<ExtensionRuntime>,
    relay: &RelayConfig,
    interceptor: &InterceptorConfig,
) -> Result<ContentInstall, InjectError> {
    if window.is_privileged() {
        return Err(InjectError::Forbidden(page));
    }
    if !window.mark(CONTENT_MARKER) {
        // The interceptor guards itself too; re-running it keeps injection idempotent.
        stream_interceptor::install(window, interceptor);
        return Ok(ContentInstall::AlreadyAttached);
    }

    let messages = window.subscribe();
    stream_interceptor::install(window, interceptor);

    let own_window = relay.window_filter.then(|| window.id());
    let handle = tokio::spawn(forward(page, own_window, messages, runtime));
    info!(page = %page, "content relay attached");
    Ok(ContentInstall::Attached(handle))
}

async fn forward(
    page: PageId,
    own_window: Option<WindowId>,
    mut messages: UnboundedReceiver<WindowMessage>,
    runtime: Arc<ExtensionRuntime>,
) {
    let sender = MessageSender { page: Some(page) };
    let mut invalidation_reported = false;

    while let Some(message) = messages.recv().await {
        if own_window.is_some_and(|id| id != message.source) {
            continue;
        }
        let Some(envelope) = CaptureEnvelope::from_value(&message.data) else {
            continue;
        };

        let kind = envelope.event.kind();
        match runtime.send_message(sender, envelope.event) {
            Ok(()) => {}
            Err(RelayError::Unreachable) => {
                warn!(page = %page, kind, "background not running; event dropped");
            }
            Err(RelayError::Closed) => {
                if !invalidation_reported {
                    warn!(
                        page = %page,
                        "extension context invalidated; refresh the page to reconnect"
                    );
                    invalidation_reported = true;
                }
            }
            Err(err) => warn!(page = %page, kind, error = %err, "failed to relay capture event"),
        }
    }
    debug!(page = %page, "content relay detached");
}
