use std::sync::{Arc, Weak};

use streamscope_core_types::{CaptureEnvelope, CaptureEvent, CaptureSink};
use tracing::trace;

use crate::window::PageWindow;

/// Hop 1: posts every capture event on the page window, tagged for the content context.
pub struct WindowPoster {
    window: Weak<PageWindow>,
}

impl WindowPoster {
    pub fn new(window: &Arc<PageWindow>) -> Self {
        Self {
            window: Arc::downgrade(window),
        }
    }
}

impl CaptureSink for WindowPoster {
    fn emit(&self, event: CaptureEvent) {
        let Some(window) = self.window.upgrade() else {
            return;
        };
        let kind = event.kind();
        let envelope = CaptureEnvelope::tagged(event);
        if let Err(err) = window.post_message(envelope.to_value()) {
            trace!(kind, error = %err, "capture event posted with no listener");
        }
    }
}
