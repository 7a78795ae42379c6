//! Content-type classification of fetch responses.

use http::header::CONTENT_TYPE;
use http::HeaderMap;

/// Streaming content types whose bodies are observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamContent {
    EventStream,
    NdJson,
    StreamJson,
}

impl StreamContent {
    /// Substring match, case-insensitive, so parameters and vendor prefixes still qualify.
    pub fn classify(content_type: &str) -> Option<Self> {
        let lowered = content_type.to_ascii_lowercase();
        if lowered.contains("event-stream") {
            Some(StreamContent::EventStream)
        } else if lowered.contains("x-ndjson") {
            Some(StreamContent::NdJson)
        } else if lowered.contains("stream+json") {
            Some(StreamContent::StreamJson)
        } else {
            None
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::classify)
    }
}
