// ChatLLM API -- mcp/frame
//! Server-Sent-Events parsing and frame classification for the MCP stream.
//!
//! The stream carries two kinds of payload: a bare path announcing where
//! messages must be POSTed, and JSON-RPC objects. Everything else is noise
//! (keep-alive comments, blank data, garbage) and is classified as ignored
//! rather than treated as an error.

use serde_json::Value;
use url::Url;

/// One dispatched SSE event: optional `event:` name plus joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Largest unterminated event the parser will hold before giving up on it.
pub const DEFAULT_MAX_EVENT_BYTES: usize = 4 * 1024 * 1024;

/// Incremental SSE parser. Bytes go in via [`feed`](Self::feed), complete
/// events come out; a trailing partial event is released by [`flush`](Self::flush).
///
/// An event that grows past `max_pending` bytes without a terminating blank
/// line is discarded whole; parsing resumes with the event after it.
#[derive(Debug)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a blank line.
    scanned: usize,
    max_pending: usize,
    discarding: bool,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_EVENT_BYTES)
    }

    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_pending,
            discarding: false,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // CRLF and LF are both valid line endings; keep only LF.
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        loop {
            // Step back one byte: the previous chunk may have ended on the first '\n'.
            let from = self.scanned.saturating_sub(1);
            let Some(offset) = find_blank_line(&self.buffer[from..]) else {
                self.scanned = self.buffer.len();
                break;
            };
            let pos = from + offset;
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            let text = String::from_utf8_lossy(&block[..pos]);
            if let Some(event) = parse_block(&text) {
                events.push(event);
            }
        }

        if self.buffer.len() > self.max_pending {
            if !self.discarding {
                tracing::warn!(
                    "MCP: SSE event exceeds {} bytes without a terminator, discarding it",
                    self.max_pending
                );
            }
            let ends_with_newline = self.buffer.last() == Some(&b'\n');
            self.buffer.clear();
            if ends_with_newline {
                self.buffer.push(b'\n');
            }
            self.scanned = self.buffer.len();
            self.discarding = true;
        }
        events
    }

    pub fn flush(&mut self) -> Vec<SseEvent> {
        let block = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return Vec::new();
        }
        let text = String::from_utf8_lossy(&block);
        parse_block(&text).into_iter().collect()
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

// ── Classification ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Callback path (or absolute URL) for outbound messages.
    Endpoint(String),
    /// A JSON object: response or server notification.
    Message(Value),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    Empty,
    Malformed(String),
    NotAnObject,
    Unrecognized,
}

pub fn classify(event: &SseEvent, endpoint_prefix: &str) -> Frame {
    let data = event.data.trim();
    if data.is_empty() {
        return Frame::Ignored(IgnoreReason::Empty);
    }

    if event.event.as_deref() == Some("endpoint") || data.starts_with(endpoint_prefix) {
        return Frame::Endpoint(data.to_string());
    }

    if data.starts_with('{') {
        return match serde_json::from_str::<Value>(data) {
            Ok(v) if v.is_object() => Frame::Message(v),
            Ok(_) => Frame::Ignored(IgnoreReason::NotAnObject),
            Err(e) => Frame::Ignored(IgnoreReason::Malformed(e.to_string())),
        };
    }

    Frame::Ignored(IgnoreReason::Unrecognized)
}

/// Build the callback URL from the base URL and an announced endpoint.
///
/// Relative paths are appended verbatim to the base (so a base with a path
/// prefix keeps it); absolute `http(s)` URLs are taken as-is.
pub fn callback_url(base: &Url, announced: &str) -> Result<Url, url::ParseError> {
    if announced.starts_with("http://") || announced.starts_with("https://") {
        return Url::parse(announced);
    }
    let base = base.as_str().trim_end_matches('/');
    let path = if announced.starts_with('/') {
        announced.to_string()
    } else {
        format!("/{announced}")
    };
    Url::parse(&format!("{base}{path}"))
}
