use streamscope_core_types::PageId;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("page {0} not found in connection list")]
    NoSession(PageId),
    #[error("session channel for page {0} is closed")]
    ChannelClosed(PageId),
    #[error("sender page not defined")]
    MissingSender,
}

impl RouteError {
    /// Metric label for a dropped event.
    pub fn reason(&self) -> &'static str {
        match self {
            RouteError::NoSession(_) => "no_session",
            RouteError::ChannelClosed(_) => "channel_closed",
            RouteError::MissingSender => "missing_sender",
        }
    }
}
