//! Generic SSE (Server-Sent Events) line parser.
//!
//! Converts an HTTP response body into a `Stream<Item = SseEvent>`.

use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use tokio_stream::StreamExt;

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Parse a reqwest response body as an SSE stream.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = anyhow::Result<SseEvent>> + Send {
    parse_sse_bytes(response.bytes_stream())
}

/// Parse any byte-chunk stream as SSE. Lines, and the UTF-8 characters in
/// them, may span chunk boundaries: bytes are only decoded once a full line
/// has arrived.
pub fn parse_sse_bytes<S, E>(bytes: S) -> impl Stream<Item = anyhow::Result<SseEvent>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + 'static,
{
    futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(bytes),
            buffer: Vec::new(),
            current_event: None,
            current_data: Vec::new(),
            current_id: None,
        },
        |mut state| async move {
            loop {
                if let Some(newline_pos) = state.buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = state.buffer.drain(..=newline_pos).collect();
                    let line = String::from_utf8_lossy(&line[..newline_pos]);

                    if let Some(event) = state.process_line(&line) {
                        return Some((Ok(event), state));
                    }
                    continue;
                }

                match state.byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        state.buffer.extend_from_slice(&chunk);
                    }
                    Some(Err(e)) => {
                        return Some((Err(anyhow::anyhow!("SSE stream error: {e}")), state));
                    }
                    None => {
                        // Stream ended mid-line or without a trailing blank line
                        if !state.buffer.is_empty() {
                            let rest = std::mem::take(&mut state.buffer);
                            let line = String::from_utf8_lossy(&rest).into_owned();
                            if let Some(event) = state.process_line(&line) {
                                return Some((Ok(event), state));
                            }
                        }
                        return state.take_event().map(|event| (Ok(event), state));
                    }
                }
            }
        },
    )
}

struct SseState<E> {
    byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>,
    buffer: Vec<u8>,
    current_event: Option<String>,
    current_data: Vec<String>,
    current_id: Option<String>,
}

impl<E> SseState<E> {
    /// Apply one line; returns an event when the line is a dispatching blank.
    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.trim_end_matches('\r');

        if line.is_empty() {
            return self.take_event();
        }
        if line.starts_with(':') {
            return None;
        }

        if let Some(value) = line.strip_prefix("event:") {
            self.current_event = Some(value.trim_start().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.current_data.push(value.trim_start().to_string());
        } else if let Some(value) = line.strip_prefix("id:") {
            self.current_id = Some(value.trim_start().to_string());
        }
        None
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if self.current_data.is_empty() {
            return None;
        }
        let event = SseEvent {
            event: self.current_event.take(),
            data: self.current_data.join("\n"),
            id: self.current_id.take(),
        };
        self.current_data.clear();
        Some(event)
    }
}
