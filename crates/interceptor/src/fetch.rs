//! fetch capability surface and its observing wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use frame_parser::{FrameParser, Utf8StreamDecoder};
use http::{HeaderMap, StatusCode};
use streamscope_core_types::{
    now_millis, CaptureEvent, CaptureSink, RawChunk, StreamClosed, StreamFailed, StreamId,
    StreamMessage, StreamOpened,
};
use thiserror::Error;
use tracing::{debug, trace};

use crate::body::Body;
use crate::classify::StreamContent;
use crate::config::InterceptorConfig;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("TypeError: Failed to fetch: {0}")]
    Network(String),
    #[error("AbortError: the operation was aborted")]
    Aborted,
    #[error("TypeError: {0}")]
    InvalidRequest(String),
}

/// A request object passed as the first fetch argument.
#[derive(Debug, Default)]
pub struct Request {
    pub url: String,
    pub method: String,
    pub headers: HeaderMap,
    pub body: Option<Body>,
}

impl Request {
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            ..Self::default()
        }
    }
}

/// First fetch argument: a URL string or a request object.
#[derive(Debug)]
pub enum Resource {
    Url(String),
    Request(Request),
}

impl Resource {
    pub fn url(&self) -> &str {
        match self {
            Resource::Url(url) => url,
            Resource::Request(request) => &request.url,
        }
    }
}

impl From<&str> for Resource {
    fn from(url: &str) -> Self {
        Resource::Url(url.to_string())
    }
}

impl From<String> for Resource {
    fn from(url: String) -> Self {
        Resource::Url(url)
    }
}

impl From<Request> for Resource {
    fn from(request: Request) -> Self {
        Resource::Request(request)
    }
}

/// Second fetch argument.
#[derive(Debug, Default)]
pub struct RequestInit {
    pub method: Option<String>,
    pub headers: Option<HeaderMap>,
    pub body: Option<Body>,
}

impl RequestInit {
    pub fn method(method: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Body>,
}

impl Response {
    pub fn new(status: StatusCode, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Consume the body as text; a body-less response reads as empty.
    pub async fn text(self) -> Result<String, crate::body::BodyError> {
        match self.body {
            Some(body) => body.text().await,
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
pub trait NativeFetch: Send + Sync {
    async fn fetch(
        &self,
        resource: Resource,
        init: Option<RequestInit>,
    ) -> Result<Response, FetchError>;

    /// The function's `toString()` output.
    fn native_source(&self) -> String {
        "function fetch() { [native code] }".to_string()
    }
}

/// Methods upper-cased when matched case-insensitively. Any other spelling is sent as given.
const NORMALIZED_METHODS: [&str; 6] = ["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"];

fn normalize_method(method: String) -> String {
    NORMALIZED_METHODS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(&method))
        .map(|known| known.to_string())
        .unwrap_or(method)
}

/// URL and method a fetch call will use: the init method wins, then the request object's,
/// then GET.
pub fn resolve_target(resource: &Resource, init: Option<&RequestInit>) -> (String, String) {
    let method = init
        .and_then(|init| init.method.clone())
        .or_else(|| match resource {
            Resource::Request(request) if !request.method.is_empty() => {
                Some(request.method.clone())
            }
            _ => None,
        })
        .unwrap_or_else(|| "GET".to_string());
    (resource.url().to_string(), normalize_method(method))
}

/// Drop-in replacement for the page's fetch binding.
pub struct InterceptedFetch {
    native: Arc<dyn NativeFetch>,
    sink: Arc<dyn CaptureSink>,
    capture_raw_chunks: bool,
}

impl InterceptedFetch {
    pub fn new(
        native: Arc<dyn NativeFetch>,
        sink: Arc<dyn CaptureSink>,
        config: &InterceptorConfig,
    ) -> Self {
        Self {
            native,
            sink,
            capture_raw_chunks: config.capture_raw_chunks,
        }
    }

    pub fn native(&self) -> &Arc<dyn NativeFetch> {
        &self.native
    }
}

#[async_trait]
impl NativeFetch for InterceptedFetch {
    async fn fetch(
        &self,
        resource: Resource,
        init: Option<RequestInit>,
    ) -> Result<Response, FetchError> {
        let id = StreamId::new();
        let (url, method) = resolve_target(&resource, init.as_ref());

        let mut response = self.native.fetch(resource, init).await?;
        let Some(content) = StreamContent::from_headers(&response.headers) else {
            return Ok(response);
        };

        trace!(stream = %id, ?content, url = %url, "observing streaming response");
        self.sink.emit(CaptureEvent::FetchStart(StreamOpened {
            id,
            url,
            method: Some(method),
            start_time: now_millis(),
        }));

        let Some(body) = response.body.take() else {
            return Ok(response);
        };
        let (page_branch, observed) = body.tee();
        response.body = Some(page_branch);

        tokio::spawn(observe_body(
            id,
            observed,
            Arc::clone(&self.sink),
            self.capture_raw_chunks,
        ));
        Ok(response)
    }

    fn native_source(&self) -> String {
        self.native.native_source()
    }
}

/// Drain the observation branch, reporting frames as they complete. Runs detached so the
/// page's own consumption never waits on it.
async fn observe_body(id: StreamId, mut body: Body, sink: Arc<dyn CaptureSink>, raw: bool) {
    let mut decoder = Utf8StreamDecoder::new();
    let mut parser = FrameParser::new();

    let emit_text = |text: String, parser: &mut FrameParser| {
        if text.is_empty() {
            return;
        }
        if raw {
            sink.emit(CaptureEvent::FetchChunk(RawChunk {
                id,
                chunk: text.clone(),
                time: now_millis(),
            }));
        }
        for frame in parser.push(&text) {
            sink.emit(CaptureEvent::EsMessage(StreamMessage {
                id,
                event_type: frame.event_type,
                data: frame.data,
                time: now_millis(),
            }));
        }
    };

    while let Some(chunk) = body.next_chunk().await {
        match chunk {
            Ok(bytes) => {
                let text = decoder.decode(&bytes);
                emit_text(text, &mut parser);
            }
            Err(err) => {
                debug!(stream = %id, error = %err, "observed body failed");
                sink.emit(CaptureEvent::FetchError(StreamFailed {
                    id,
                    error: err.to_string(),
                    time: now_millis(),
                }));
                return;
            }
        }
    }

    let tail = decoder.finish();
    emit_text(tail, &mut parser);
    if let Some(residue) = parser.finish() {
        debug!(
            stream = %id,
            partial = %residue.partial_line,
            pending = residue.pending_lines,
            "discarding unterminated trailing record"
        );
    }
    sink.emit(CaptureEvent::FetchDone(StreamClosed {
        id,
        time: now_millis(),
    }));
}
