// crates/toolgate-bundle/src/sse.rs
// ============================================================================
// Module: SSE Frame Parser
// Description: Incremental parser for server-sent event streams.
// Purpose: Split byte chunks into events for the change-stream subscriber.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A minimal incremental SSE parser: bytes are pushed as they arrive and
//! complete events (terminated by a blank line) are popped. Only the
//! `event:` and `data:` fields are interpreted; comment lines (`:`) and
//! unknown fields are skipped. Data lines concatenate with newlines per the
//! SSE specification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;

// ============================================================================
// SECTION: Event
// ============================================================================

/// One parsed server-sent event.
///
/// # Invariants
/// - `data` joins all `data:` lines of the frame with `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name, when the frame carried an `event:` field.
    pub event: Option<String>,
    /// Concatenated data payload.
    pub data: String,
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Incremental SSE frame parser.
///
/// # Invariants
/// - `buffer` holds at most one incomplete frame plus unconsumed input.
#[derive(Debug, Default)]
pub struct SseParser {
    /// Unconsumed input bytes.
    buffer: Vec<u8>,
    /// Completed events awaiting consumption.
    ready: VecDeque<SseEvent>,
}

impl SseParser {
    /// Creates an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a chunk of bytes into the parser.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        self.drain_frames();
    }

    /// Pops the next completed event.
    pub fn next_event(&mut self) -> Option<SseEvent> {
        self.ready.pop_front()
    }

    /// Flushes a trailing unterminated frame at end of stream.
    pub fn flush(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return self.ready.pop_front();
        }
        let remainder = std::mem::take(&mut self.buffer);
        if let Some(event) = parse_frame(&remainder) {
            self.ready.push_back(event);
        }
        self.ready.pop_front()
    }

    /// Extracts completed frames from the buffer.
    fn drain_frames(&mut self) {
        loop {
            let Some(end) = find_frame_end(&self.buffer) else {
                return;
            };
            let frame: Vec<u8> = self.buffer.drain(..end.frame_len).collect();
            self.buffer.drain(..end.separator_len);
            if let Some(event) = parse_frame(&frame) {
                self.ready.push_back(event);
            }
        }
    }
}

// ============================================================================
// SECTION: Frame Helpers
// ============================================================================

/// Location of a frame terminator in the buffer.
struct FrameEnd {
    /// Bytes belonging to the frame.
    frame_len: usize,
    /// Bytes of the terminating blank line.
    separator_len: usize,
}

/// Finds the first blank-line terminator (`\n\n` or `\r\n\r\n`).
fn find_frame_end(buffer: &[u8]) -> Option<FrameEnd> {
    let mut candidate: Option<FrameEnd> = None;
    if let Some(index) = find_subsequence(buffer, b"\n\n") {
        candidate = Some(FrameEnd {
            frame_len: index,
            separator_len: 2,
        });
    }
    if let Some(index) = find_subsequence(buffer, b"\r\n\r\n") {
        let better = candidate.as_ref().is_none_or(|end| index < end.frame_len);
        if better {
            candidate = Some(FrameEnd {
                frame_len: index,
                separator_len: 4,
            });
        }
    }
    candidate
}

/// Finds the first occurrence of a byte pattern.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Parses one frame into an event; returns `None` for comment-only frames.
fn parse_frame(frame: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(frame);
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim_start().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::SseEvent;
    use super::SseParser;

    #[test]
    fn parses_single_event() {
        let mut parser = SseParser::new();
        parser.push(b"event: change\ndata: {\"revision\":1}\n\n");
        assert_eq!(
            parser.next_event(),
            Some(SseEvent {
                event: Some("change".to_string()),
                data: "{\"revision\":1}".to_string(),
            })
        );
        assert_eq!(parser.next_event(), None);
    }

    #[test]
    fn handles_split_chunks() {
        let mut parser = SseParser::new();
        parser.push(b"data: hel");
        assert_eq!(parser.next_event(), None);
        parser.push(b"lo\n\ndata: world\n\n");
        assert_eq!(parser.next_event().map(|event| event.data), Some("hello".to_string()));
        assert_eq!(parser.next_event().map(|event| event.data), Some("world".to_string()));
    }

    #[test]
    fn skips_keepalive_comments() {
        let mut parser = SseParser::new();
        parser.push(b": keep-alive\n\ndata: x\n\n");
        assert_eq!(parser.next_event().map(|event| event.data), Some("x".to_string()));
        assert_eq!(parser.next_event(), None);
    }

    #[test]
    fn joins_multi_line_data() {
        let mut parser = SseParser::new();
        parser.push(b"data: a\ndata: b\n\n");
        assert_eq!(parser.next_event().map(|event| event.data), Some("a\nb".to_string()));
    }

    #[test]
    fn handles_crlf_frames() {
        let mut parser = SseParser::new();
        parser.push(b"event: reload\r\ndata: reload\r\n\r\n");
        let event = parser.next_event().unwrap();
        assert_eq!(event.event.as_deref(), Some("reload"));
        assert_eq!(event.data, "reload");
    }

    #[test]
    fn flush_recovers_trailing_frame() {
        let mut parser = SseParser::new();
        parser.push(b"data: tail");
        assert_eq!(parser.next_event(), None);
        assert_eq!(parser.flush().map(|event| event.data), Some("tail".to_string()));
    }
}
