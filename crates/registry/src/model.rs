use streamscope_core_types::PageId;
use streamscope_relay::SessionPort;

/// The channel currently serving one inspected page.
#[derive(Clone, Debug)]
pub struct Connection {
    pub page: PageId,
    pub port: SessionPort,
    /// Milliseconds since the Unix epoch.
    pub registered_at: i64,
}
