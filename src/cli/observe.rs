//! Shared driver for `replay` and `watch`: open a page, attach an inspection session, issue
//! one fetch from the page and print what the session receives.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use stream_interceptor::{NativeEventSourceClass, NativeFetch, RequestInit, Resource, StreamContent};
use streamscope_cli::Pipeline;
use streamscope_core_types::CaptureEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::cli::output::OutputFormat;

const CONNECT_WAIT: Duration = Duration::from_secs(5);

pub struct ObserveRequest {
    pub url: String,
    pub method: String,
}

#[derive(Debug, Default)]
pub struct Observation {
    pub events: usize,
    pub completed: bool,
}

pub async fn observe<F>(
    pipeline: &Pipeline,
    event_source: Arc<dyn NativeEventSourceClass>,
    fetch: Arc<dyn NativeFetch>,
    request: ObserveRequest,
    output: &OutputFormat,
    stop: F,
) -> Result<Observation>
where
    F: Future<Output = ()>,
{
    let (page, window) = pipeline
        .open_page(event_source, fetch)
        .context("Failed to open page")?;
    let session = pipeline.inspect(page);
    let mut live = session.subscribe();

    if !pipeline.wait_for_connection(page, CONNECT_WAIT).await {
        bail!("inspection session for page {page} never registered");
    }

    let mut response = window
        .fetch()
        .fetch(
            Resource::from(request.url.as_str()),
            Some(RequestInit::method(request.method.as_str())),
        )
        .await
        .with_context(|| format!("{} {} failed", request.method, request.url))?;
    info!(status = %response.status, url = %response.url, "response received");

    let mut observation = Observation::default();
    if StreamContent::from_headers(&response.headers).is_none() {
        warn!("response is not a stream; nothing to capture");
        session.shutdown().await?;
        return Ok(observation);
    }

    // The page drains its own branch of the tee.
    let page_body = response.body.take();
    let reader = tokio::spawn(async move {
        if let Some(body) = page_body {
            match body.bytes().await {
                Ok(bytes) => debug!(len = bytes.len(), "page finished reading body"),
                Err(err) => debug!(%err, "page body read failed"),
            }
        }
    });

    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => {
                info!("observation stopped");
                break;
            }
            received = live.recv() => match received {
                Ok(event) => {
                    print_event(&event, output)?;
                    observation.events += 1;
                    if matches!(event, CaptureEvent::FetchDone(_) | CaptureEvent::FetchError(_)) {
                        observation.completed = true;
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "output fell behind; events skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    reader.abort();
    let sessions = session.sessions().len();
    session.shutdown().await?;
    info!(
        events = observation.events,
        sessions,
        completed = observation.completed,
        "observation finished"
    );
    Ok(observation)
}

fn print_event(event: &CaptureEvent, output: &OutputFormat) -> Result<()> {
    output.emit(event, || describe(event))
}

fn describe(event: &CaptureEvent) -> String {
    let at = DateTime::<Utc>::from_timestamp_millis(event.time())
        .map(|at| at.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| event.time().to_string());
    let head = format!("{at} {:<12} {}", event.kind(), event.stream_id());
    match event {
        CaptureEvent::EsConnect(open) | CaptureEvent::FetchStart(open) => {
            let method = open.method.as_deref().unwrap_or("SSE");
            format!("{head} {method} {}", open.url)
        }
        CaptureEvent::EsMessage(message) => {
            format!("{head} [{}] {}", message.event_type, message.data)
        }
        CaptureEvent::FetchChunk(chunk) => format!("{head} {:?}", chunk.chunk),
        CaptureEvent::FetchError(failed) => format!("{head} {}", failed.error),
        CaptureEvent::EsError(_) | CaptureEvent::FetchDone(_) => head,
    }
}
