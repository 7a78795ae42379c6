//! Incremental event-stream frame parser.
//!
//! Text arrives in chunks whose boundaries bear no relation to line or record boundaries. The
//! parser keeps the unterminated tail between pushes and hands back, lazily and in wire order,
//! every record completed by the latest chunk.
//!
//! Framing rules:
//! - a line ends at `\n`; one trailing `\r` is stripped, so `\r\n` input frames identically;
//! - a blank line terminates the current record;
//! - `event:` sets the record's type (trimmed, last occurrence wins, empty means `message`);
//! - `data:` appends one payload line with at most one leading space removed; payload lines
//!   are joined with `\n`;
//! - other fields (`id:`, `retry:`, `:` comments) are ignored;
//! - a record is emitted when it carries a non-blank payload line or a non-default type;
//!   anything else is a keep-alive and is dropped.
//!
//! A trailing record with no terminating blank line is never emitted; [`FrameParser::finish`]
//! reports it as [`Residue`] so callers can log what was discarded.

pub mod decoder;

use serde::{Deserialize, Serialize};
use streamscope_core_types::DEFAULT_EVENT_TYPE;

pub use decoder::Utf8StreamDecoder;

/// One decoded `(eventType, data)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub event_type: String,
    pub data: String,
}

impl Frame {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }
}

/// Material still buffered when the stream ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Residue {
    /// Text after the last line break.
    pub partial_line: String,
    /// Complete lines belonging to the unterminated record.
    pub pending_lines: usize,
}

#[derive(Debug, Default)]
struct Record {
    event_type: Option<String>,
    data: Vec<String>,
    lines: usize,
}

impl Record {
    fn apply(&mut self, line: &str) {
        self.lines += 1;
        if let Some(value) = line.strip_prefix("event:") {
            self.event_type = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
    }

    fn into_frame(self) -> Option<Frame> {
        let event_type = match self.event_type {
            Some(kind) if !kind.is_empty() => kind,
            _ => DEFAULT_EVENT_TYPE.to_string(),
        };
        let has_payload = self.data.iter().any(|line| !line.is_empty());
        if !has_payload && event_type == DEFAULT_EVENT_TYPE {
            return None;
        }
        Some(Frame {
            event_type,
            data: self.data.join("\n"),
        })
    }
}

/// Per-stream parser state: the unconsumed text plus the record being assembled.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
    cursor: usize,
    record: Record,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and iterate over the records it completes.
    ///
    /// The iterator is lazy: records not pulled before it is dropped stay buffered and come out
    /// first on the next push, so wire order is kept either way.
    pub fn push(&mut self, chunk: &str) -> Frames<'_> {
        if self.cursor > 0 {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
        }
        self.buffer.push_str(chunk);
        Frames { parser: self }
    }

    /// Unterminated text after the last line break.
    pub fn residual(&self) -> &str {
        &self.buffer[self.cursor..]
    }

    /// True when no partial line or partial record is buffered.
    pub fn is_idle(&self) -> bool {
        self.residual().is_empty() && self.record.lines == 0
    }

    /// End of stream: whatever is still buffered is discarded and reported.
    pub fn finish(self) -> Option<Residue> {
        if self.is_idle() {
            return None;
        }
        Some(Residue {
            partial_line: self.residual().to_string(),
            pending_lines: self.record.lines,
        })
    }

    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let rest = &self.buffer[self.cursor..];
            let newline = rest.find('\n')?;
            let line = &rest[..newline];
            let line = line.strip_suffix('\r').unwrap_or(line);
            let consumed = newline + 1;

            if line.is_empty() {
                self.cursor += consumed;
                if let Some(frame) = std::mem::take(&mut self.record).into_frame() {
                    return Some(frame);
                }
                continue;
            }

            self.record.apply(line);
            self.cursor += consumed;
        }
    }
}

/// Lazy iterator over the records completed by one [`FrameParser::push`].
pub struct Frames<'a> {
    parser: &'a mut FrameParser,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_frame()
    }
}

/// Parse a complete body in one pass; the unterminated tail is discarded.
pub fn parse_all(text: &str) -> Vec<Frame> {
    let mut parser = FrameParser::new();
    parser.push(text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_event_then_default_event() {
        let mut parser = FrameParser::new();
        let first: Vec<_> = parser.push("event: foo\ndata: 1\n\n").collect();
        assert_eq!(first, vec![Frame::new("foo", "1")]);

        let second: Vec<_> = parser.push("data: 2\n\ndata: 3").collect();
        assert_eq!(second, vec![Frame::new("message", "2")]);
        assert_eq!(parser.residual(), "data: 3");

        let residue = parser.finish().expect("tail is buffered");
        assert_eq!(residue.partial_line, "data: 3");
        assert_eq!(residue.pending_lines, 0);
    }

    #[test]
    fn multiple_data_lines_join_with_newline() {
        assert_eq!(
            parse_all("data: a\ndata: b\n\n"),
            vec![Frame::new("message", "a\nb")]
        );
    }

    #[test]
    fn only_one_leading_space_is_stripped() {
        assert_eq!(
            parse_all("data:  padded\ndata:tight\n\n"),
            vec![Frame::new("message", " padded\ntight")]
        );
    }

    #[test]
    fn blank_default_records_are_dropped() {
        assert!(parse_all("data:\n\n").is_empty());
        assert!(parse_all("data: \ndata:\n\n").is_empty());
        assert!(parse_all(": keep-alive\n\n").is_empty());
        assert!(parse_all("id: 4\nretry: 10\n\n").is_empty());
        assert!(parse_all("\n\n\n\n").is_empty());
    }

    #[test]
    fn named_record_without_data_is_emitted() {
        assert_eq!(parse_all("event: ping\n\n"), vec![Frame::new("ping", "")]);
    }

    #[test]
    fn last_event_field_wins_and_empty_type_means_message() {
        assert_eq!(
            parse_all("event: a\nevent: b\ndata: x\n\n"),
            vec![Frame::new("b", "x")]
        );
        assert_eq!(
            parse_all("event:\ndata: y\n\n"),
            vec![Frame::new("message", "y")]
        );
    }

    #[test]
    fn crlf_line_endings_frame_like_lf() {
        assert_eq!(
            parse_all("event: foo\r\ndata: 1\r\n\r\ndata: 2\r\n\r\n"),
            vec![Frame::new("foo", "1"), Frame::new("message", "2")]
        );
    }

    #[test]
    fn undrained_frames_survive_until_next_push() {
        let mut parser = FrameParser::new();
        {
            let mut frames = parser.push("data: 1\n\ndata: 2\n\n");
            assert_eq!(frames.next(), Some(Frame::new("message", "1")));
        }
        let rest: Vec<_> = parser.push("data: 3\n\n").collect();
        assert_eq!(
            rest,
            vec![Frame::new("message", "2"), Frame::new("message", "3")]
        );
        assert!(parser.is_idle());
        assert!(parser.finish().is_none());
    }

    #[test]
    fn pending_record_lines_are_reported_at_finish() {
        let mut parser = FrameParser::new();
        assert_eq!(parser.push("event: x\ndata: 9\n").count(), 0);
        let residue = parser.finish().expect("record pending");
        assert_eq!(residue.pending_lines, 2);
        assert!(residue.partial_line.is_empty());
    }
}
