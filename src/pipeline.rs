//! In-process wiring of every context: pages with their content relays, the background
//! router, and inspection sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use prometheus::{Encoder, Registry, TextEncoder};
use stream_interceptor::{NativeEventSourceClass, NativeFetch, PageWindow};
use streamscope_core_types::PageId;
use streamscope_inspector::{InspectionSession, SessionHandle};
use streamscope_registry::{BackgroundRouter, RouterHandle, ScriptInjector, SessionRegistry};
use streamscope_relay::{ContentInstall, ExtensionRuntime, InjectError};
use tracing::{debug, info, warn};

use crate::config::StreamScopeConfig;

type Pages = DashMap<PageId, Arc<PageWindow>>;

/// Injects the content relay into whichever document a page currently shows.
struct PageInjector {
    pages: Arc<Pages>,
    runtime: Arc<ExtensionRuntime>,
    config: StreamScopeConfig,
}

impl PageInjector {
    fn install(&self, page: PageId) -> Result<ContentInstall, InjectError> {
        let window = self
            .pages
            .get(&page)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(InjectError::PageGone(page))?;
        streamscope_relay::install(
            page,
            &window,
            Arc::clone(&self.runtime),
            &self.config.relay,
            &self.config.interceptor,
        )
    }
}

#[async_trait]
impl ScriptInjector for PageInjector {
    async fn inject(&self, page: PageId) -> Result<(), InjectError> {
        self.install(page).map(|_| ())
    }
}

pub struct Pipeline {
    runtime: Arc<ExtensionRuntime>,
    pages: Arc<Pages>,
    injector: Arc<PageInjector>,
    router: Mutex<Option<RouterHandle>>,
    config: StreamScopeConfig,
    next_page: AtomicU64,
    metrics: Registry,
}

impl Pipeline {
    /// Start the background router. Must be called inside a tokio runtime.
    pub fn start(config: StreamScopeConfig) -> Self {
        let runtime = ExtensionRuntime::new();
        let pages: Arc<Pages> = Arc::new(DashMap::new());
        let injector = Arc::new(PageInjector {
            pages: Arc::clone(&pages),
            runtime: Arc::clone(&runtime),
            config: config.clone(),
        });
        let metrics = Registry::new();
        streamscope_registry::metrics::register_metrics(&metrics);
        let pipeline = Self {
            runtime,
            pages,
            injector,
            router: Mutex::new(None),
            config,
            next_page: AtomicU64::new(1),
            metrics,
        };
        *pipeline.router.lock() = Some(pipeline.spawn_router());
        pipeline
    }

    fn spawn_router(&self) -> RouterHandle {
        BackgroundRouter::spawn(
            self.runtime.start_background(),
            Arc::new(SessionRegistry::new()),
            self.injector.clone(),
            self.config.registry.clone(),
        )
    }

    pub fn runtime(&self) -> &Arc<ExtensionRuntime> {
        &self.runtime
    }

    pub fn config(&self) -> &StreamScopeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Registry {
        &self.metrics
    }

    /// Prometheus text exposition of the router metrics.
    pub fn render_metrics(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(err) = TextEncoder::new().encode(&self.metrics.gather(), &mut buffer) {
            warn!(?err, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Registry of the currently running router, if any.
    pub fn registry(&self) -> Option<Arc<SessionRegistry>> {
        self.router
            .lock()
            .as_ref()
            .map(|router| Arc::clone(router.registry()))
    }

    fn new_window(
        &self,
        event_source: Arc<dyn NativeEventSourceClass>,
        fetch: Arc<dyn NativeFetch>,
    ) -> Arc<PageWindow> {
        PageWindow::new(event_source, fetch)
    }

    /// Track a page without running anything in it.
    pub fn add_page(&self, window: Arc<PageWindow>) -> PageId {
        let page = PageId(self.next_page.fetch_add(1, Ordering::SeqCst));
        self.pages.insert(page, window);
        page
    }

    /// Open a page and run the content relay in it, as the browser does at document start.
    pub fn open_page(
        &self,
        event_source: Arc<dyn NativeEventSourceClass>,
        fetch: Arc<dyn NativeFetch>,
    ) -> Result<(PageId, Arc<PageWindow>), InjectError> {
        let window = self.new_window(event_source, fetch);
        let page = self.add_page(Arc::clone(&window));
        self.injector.install(page)?;
        info!(page = %page, "page opened");
        Ok((page, window))
    }

    /// Replace a page's document. The old window and everything attached to it are dropped.
    pub fn navigate(
        &self,
        page: PageId,
        event_source: Arc<dyn NativeEventSourceClass>,
        fetch: Arc<dyn NativeFetch>,
    ) -> Result<Arc<PageWindow>, InjectError> {
        if !self.pages.contains_key(&page) {
            return Err(InjectError::PageGone(page));
        }
        let window = self.new_window(event_source, fetch);
        self.pages.insert(page, Arc::clone(&window));
        self.injector.install(page)?;
        debug!(page = %page, "page navigated");
        Ok(window)
    }

    pub fn close_page(&self, page: PageId) -> bool {
        self.pages.remove(&page).is_some()
    }

    pub fn window(&self, page: PageId) -> Option<Arc<PageWindow>> {
        self.pages.get(&page).map(|entry| Arc::clone(entry.value()))
    }

    /// Open an inspection session for `page`.
    pub fn inspect(&self, page: PageId) -> SessionHandle {
        InspectionSession::spawn(
            Arc::clone(&self.runtime),
            page,
            self.config.inspector.clone(),
        )
    }

    /// Wait until an inspection session for `page` is registered with the running router.
    pub async fn wait_for_connection(&self, page: PageId, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let connected = self
                .registry()
                .map(|registry| registry.connection(page).is_some())
                .unwrap_or(false);
            if connected {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Tear the background down and bring up a fresh one with an empty registry, as when the
    /// browser recycles the extension's background worker.
    pub async fn restart_background(&self) -> Result<(), tokio::task::JoinError> {
        let previous = self.router.lock().take();
        if let Some(previous) = previous {
            previous.shutdown().await?;
        }
        let router = self.spawn_router();
        *self.router.lock() = Some(router);
        info!("background restarted");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), tokio::task::JoinError> {
        let router = self.router.lock().take();
        self.pages.clear();
        match router {
            Some(router) => router.shutdown().await,
            None => Ok(()),
        }
    }
}
