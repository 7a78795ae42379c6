//! Background message loop: accepts session channels and routes relayed capture events.

use std::sync::Arc;

use streamscope_core_types::PageId;
use streamscope_relay::{BackgroundInbox, IncomingPort, MessageSender, RuntimeMessage, SessionMessage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::ScriptInjector, config::RegistryConfig, errors::RouteError, metrics,
    state::SessionRegistry,
};

/// Running background router. Dropping the handle stops it.
pub struct RouterHandle {
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RouterHandle {
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Stop the router and wait for it. Every session channel it held is released, so
    /// sessions observe a disconnect.
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

impl Drop for RouterHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
            self.registry.clear();
        }
    }
}

pub struct BackgroundRouter;

impl BackgroundRouter {
    pub fn spawn(
        inbox: BackgroundInbox,
        registry: Arc<SessionRegistry>,
        injector: Arc<dyn ScriptInjector>,
        config: RegistryConfig,
    ) -> RouterHandle {
        let cancel = CancellationToken::new();
        let loop_token = cancel.clone();
        let loop_registry = Arc::clone(&registry);
        let task = tokio::spawn(run(inbox, loop_registry, injector, config, loop_token));
        RouterHandle {
            registry,
            cancel,
            task: Some(task),
        }
    }
}

async fn run(
    mut inbox: BackgroundInbox,
    registry: Arc<SessionRegistry>,
    injector: Arc<dyn ScriptInjector>,
    config: RegistryConfig,
    token: CancellationToken,
) {
    info!("background router started");
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            message = inbox.messages.recv() => match message {
                Some(message) => route(&registry, message),
                None => break,
            },
            incoming = inbox.connects.recv() => match incoming {
                Some(incoming) => {
                    tokio::spawn(serve_port(
                        incoming,
                        Arc::clone(&registry),
                        Arc::clone(&injector),
                        config.reinject_on_announce,
                        token.child_token(),
                    ));
                }
                None => break,
            },
        }
    }
    // Releases the channel tasks as well as the table.
    token.cancel();
    registry.clear();
    info!("background router stopped");
}

fn route(registry: &SessionRegistry, message: RuntimeMessage) {
    let RuntimeMessage { sender, event } = message;
    let result = match sender {
        MessageSender { page: Some(page) } => registry.route_to(page, event),
        MessageSender { page: None } => {
            warn!(kind = event.kind(), "sender page not defined");
            Err(RouteError::MissingSender)
        }
    };
    match result {
        Ok(()) => metrics::record_routed(),
        Err(err) => metrics::record_dropped(err.reason()),
    }
}

async fn serve_port(
    incoming: IncomingPort,
    registry: Arc<SessionRegistry>,
    injector: Arc<dyn ScriptInjector>,
    reinject: bool,
    token: CancellationToken,
) {
    let IncomingPort { port, mut inbox } = incoming;
    let port_id = port.id();
    debug!(port = %port_id, name = port.name(), "session channel connected");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            message = inbox.recv() => match message {
                Some(SessionMessage::Init { page_id }) => {
                    registry.register(page_id, port.clone());
                    info!(page = %page_id, port = %port_id, "inspection session registered");
                    if reinject {
                        spawn_reinject(Arc::clone(&injector), page_id);
                    }
                }
                None => {
                    if let Some(page) = registry.unregister(&port_id) {
                        info!(page = %page, port = %port_id, "inspection session disconnected");
                    }
                    break;
                }
            },
        }
    }
}

fn spawn_reinject(injector: Arc<dyn ScriptInjector>, page: PageId) {
    tokio::spawn(async move {
        if let Err(err) = injector.inject(page).await {
            debug!(page = %page, error = %err, "re-injection skipped");
        }
    });
}

