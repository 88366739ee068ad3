//! Decoder for the Messages API server-sent event stream.
//!
//! Only text deltas matter to persona generation; every other event type is skipped.

use std::collections::VecDeque;

use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;

use super::{LlmError, TextStream};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: StreamErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    message: String,
}

/// What a single SSE line contributed.
#[derive(Debug, PartialEq)]
pub enum StreamItem {
    Text(String),
    Stop,
}

/// Interprets one SSE line. `Ok(None)` for lines that carry nothing of interest
/// (`event:` lines, comments, pings, non-text deltas).
pub fn parse_stream_line(line: &str) -> Result<Option<StreamItem>, LlmError> {
    let Some(payload) = line.trim().strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return Ok(None);
    }

    let event: StreamEvent =
        serde_json::from_str(payload).map_err(|e| LlmError::Stream(e.to_string()))?;

    match event {
        StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } => Ok(Some(StreamItem::Text(text))),
        StreamEvent::MessageStop => Ok(Some(StreamItem::Stop)),
        StreamEvent::Error { error } => Err(LlmError::Api {
            status: 200,
            message: error.message,
        }),
        _ => Ok(None),
    }
}

/// Splits an arbitrary byte chunking into complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends a chunk and returns every line it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            lines.push(text.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }
}

struct DeltaState {
    bytes: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    lines: LineBuffer,
    ready: VecDeque<Result<String, LlmError>>,
    done: bool,
}

/// Turns a streaming HTTP response into a stream of text deltas.
///
/// The stream ends after `message_stop`, on the first error, or when the body ends.
pub fn text_deltas(response: reqwest::Response) -> TextStream {
    let state = DeltaState {
        bytes: response.bytes_stream().boxed(),
        lines: LineBuffer::default(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for line in state.lines.push(&chunk) {
                        match parse_stream_line(&line) {
                            Ok(Some(StreamItem::Text(text))) => state.ready.push_back(Ok(text)),
                            Ok(Some(StreamItem::Stop)) => {
                                state.done = true;
                                break;
                            }
                            Ok(None) => {}
                            Err(e) => {
                                state.ready.push_back(Err(e));
                                state.done = true;
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    state.ready.push_back(Err(LlmError::Http(e)));
                    state.done = true;
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_delta_is_extracted() {
        let line = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"{\"per"}}"#;
        assert_eq!(
            parse_stream_line(line).unwrap(),
            Some(StreamItem::Text("{\"per".to_string()))
        );
    }

    #[test]
    fn test_event_and_ping_lines_are_skipped() {
        assert_eq!(parse_stream_line("event: content_block_delta").unwrap(), None);
        assert_eq!(parse_stream_line(r#"data: {"type":"ping"}"#).unwrap(), None);
        assert_eq!(parse_stream_line("").unwrap(), None);
    }

    #[test]
    fn test_non_text_delta_is_skipped() {
        let line = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#;
        assert_eq!(parse_stream_line(line).unwrap(), None);
    }

    #[test]
    fn test_message_stop_ends_stream() {
        assert_eq!(
            parse_stream_line(r#"data: {"type":"message_stop"}"#).unwrap(),
            Some(StreamItem::Stop)
        );
    }

    #[test]
    fn test_error_event_becomes_api_error() {
        let line = r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        match parse_stream_line(line) {
            Err(LlmError::Api { message, .. }) => assert_eq!(message, "Overloaded"),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_line_buffer_joins_split_chunks() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let lines = buffer.push(b":1}\r\n\ndata: x");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new()]);
        assert_eq!(buffer.push(b"\n"), vec!["data: x".to_string()]);
    }
}
