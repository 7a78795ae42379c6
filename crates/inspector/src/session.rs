use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use streamscope_core_types::{CaptureEvent, PageId, StreamEvent, StreamId, StreamSession};
use streamscope_relay::{ExtensionRuntime, SessionMessage};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::InspectorConfig;
use crate::log::StreamLog;

/// An inspection session bound to one page.
pub struct InspectionSession;

impl InspectionSession {
    /// Open the session: connect, announce the page, record what arrives, and reconnect after
    /// a fixed delay whenever the channel drops.
    pub fn spawn(
        runtime: Arc<ExtensionRuntime>,
        page: PageId,
        config: InspectorConfig,
    ) -> SessionHandle {
        let log = Arc::new(RwLock::new(StreamLog::new(config.history)));
        let (events, _) = broadcast::channel(config.history.max(1));
        let (announced_tx, announced) = watch::channel(0u64);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            runtime,
            page,
            config,
            Arc::clone(&log),
            events.clone(),
            announced_tx,
            cancel.clone(),
        ));

        SessionHandle {
            page,
            log,
            events,
            announced,
            cancel,
            task: Some(task),
        }
    }
}

pub struct SessionHandle {
    page: PageId,
    log: Arc<RwLock<StreamLog>>,
    events: broadcast::Sender<CaptureEvent>,
    announced: watch::Receiver<u64>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn log(&self) -> Arc<RwLock<StreamLog>> {
        Arc::clone(&self.log)
    }

    pub fn sessions(&self) -> Vec<StreamSession> {
        self.log.read().sessions().to_vec()
    }

    pub fn events_for(&self, id: StreamId) -> Vec<StreamEvent> {
        self.log.read().events_for(id)
    }

    /// Live feed of delivered capture events, after they are recorded.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// How many times the session has announced itself so far.
    pub fn announcements(&self) -> u64 {
        *self.announced.borrow()
    }

    /// Wait until at least `count` announcements have been sent.
    pub async fn wait_for_announcements(&self, count: u64) -> bool {
        let mut announced = self.announced.clone();
        let ok = announced.wait_for(|sent| *sent >= count).await.is_ok();
        ok
    }

    /// The inspected page navigated away; streams seen so far belong to the old document.
    pub fn navigated(&self) {
        self.log.write().clear();
        debug!(page = %self.page, "stream log cleared on navigation");
    }

    pub async fn shutdown(mut self) -> Result<(), tokio::task::JoinError> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(_) => Ok(()),
                Err(err) if err.is_cancelled() => Ok(()),
                Err(err) => Err(err),
            }
        } else {
            Ok(())
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    runtime: Arc<ExtensionRuntime>,
    page: PageId,
    config: InspectorConfig,
    log: Arc<RwLock<StreamLog>>,
    events: broadcast::Sender<CaptureEvent>,
    announced: watch::Sender<u64>,
    token: CancellationToken,
) {
    let delay = Duration::from_millis(config.reconnect_delay_ms);
    loop {
        match runtime.connect(&config.port_name) {
            Ok(mut end) => {
                match end.post(SessionMessage::Init { page_id: page }) {
                    Ok(()) => {
                        announced.send_modify(|sent| *sent += 1);
                        info!(page = %page, port = %end.id(), "inspection session announced");
                    }
                    Err(err) => warn!(page = %page, error = %err, "announce failed"),
                }
                loop {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        next = end.recv() => match next {
                            Some(event) => {
                                log.write().apply(&event);
                                // Nobody subscribed is fine; the log already has it.
                                let _ = events.send(event);
                            }
                            None => break,
                        },
                    }
                }
                warn!(
                    page = %page,
                    delay_ms = config.reconnect_delay_ms,
                    "session channel disconnected; reconnecting"
                );
            }
            Err(err) => {
                debug!(page = %page, error = %err, "background unreachable; will retry");
            }
        }

        tokio::select! {
            _ = token.cancelled() => return,
            _ = sleep(delay) => {}
        }
    }
}
