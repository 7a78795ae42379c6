//! Cross-context relay for StreamScope.
//!
//! Hop 1 runs from the interceptor to the content context over the page window. Hop 2 runs
//! from the content context to the background over one-shot runtime messages. Session
//! channels (ports) carry routed events on to inspection sessions. Every hop is
//! fire-and-forget: a missing receiver is a normal outcome, logged and skipped.

pub mod config;
pub mod content;
pub mod port;
pub mod runtime;

pub use config::RelayConfig;
pub use content::{install, ContentInstall, InjectError, CONTENT_MARKER};
pub use port::{port_pair, IncomingPort, SessionEnd, SessionMessage, SessionPort};
pub use runtime::{BackgroundInbox, ExtensionRuntime, MessageSender, RuntimeMessage};
