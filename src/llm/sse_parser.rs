// ABOUTME: Line-buffering Server-Sent Events parser for streamed chat completions
// ABOUTME: Reassembles data frames split across network chunks and carries the retry policy for stream setup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # SSE Stream Parser
//!
//! Chat completion streams arrive as `data: {json}` lines. Network chunks do
//! not line up with those frames: one chunk can carry several frames and one
//! frame can be split across chunks. [`SseLineBuffer`] keeps the unterminated
//! tail between reads and [`create_sse_stream`] turns a byte stream into a
//! [`ChatStream`] using a provider-supplied frame parser.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{future, Stream, StreamExt};

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

/// A parsed SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line with the prefix stripped
    Data(String),
    /// The `[DONE]` terminator
    Done,
}

/// Accumulates bytes until complete lines are available
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    /// Create an empty buffer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Append a network chunk and return every frame completed by it
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Parse whatever remains once the byte stream has ended
    pub fn flush(&mut self) -> Option<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        parse_line(&remaining)
    }
}

/// Interpret one SSE line; `event:`, `id:` and comment lines yield nothing
fn parse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();
    let data = trimmed.strip_prefix("data:")?.trim();
    match data {
        "" => None,
        "[DONE]" => Some(SseEvent::Done),
        payload => Some(SseEvent::Data(payload.to_owned())),
    }
}

/// Terminal chunk emitted for `[DONE]`
fn final_chunk() -> StreamChunk {
    StreamChunk::finished(Some("stop".to_owned()))
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

struct SseStreamState<F> {
    bytes: ByteStream,
    parser: SseLineBuffer,
    pending: VecDeque<Result<StreamChunk, AppError>>,
    parse_data: F,
    provider_name: &'static str,
    ended: bool,
}

impl<F> SseStreamState<F>
where
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>>,
{
    fn enqueue(&mut self, event: SseEvent) {
        match event {
            SseEvent::Data(payload) => {
                if let Some(result) = (self.parse_data)(&payload) {
                    self.pending.push_back(result);
                }
            }
            SseEvent::Done => self.pending.push_back(Ok(final_chunk())),
        }
    }
}

/// Wrap a raw response byte stream into a stream of parsed chunks
///
/// `parse_data` converts one provider JSON frame into a chunk; returning `None`
/// skips frames that carry no content (role announcements, usage blocks).
/// Empty non-final deltas are dropped.
pub fn create_sse_stream<S, F>(byte_stream: S, parse_data: F, provider_name: &'static str) -> ChatStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let state = SseStreamState {
        bytes: Box::pin(byte_stream),
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        parse_data,
        provider_name,
        ended: false,
    };

    let stream = unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.ended {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    for event in state.parser.feed(&bytes) {
                        state.enqueue(event);
                    }
                }
                Some(Err(e)) => {
                    state.ended = true;
                    let error = AppError::external_service(
                        state.provider_name,
                        format!("Stream read error: {e}"),
                    );
                    return Some((Err(error), state));
                }
                None => {
                    state.ended = true;
                    if let Some(event) = state.parser.flush() {
                        state.enqueue(event);
                    }
                }
            }
        }
    });

    let filtered = stream.filter(|result| {
        future::ready(
            result
                .as_ref()
                .map_or(true, |chunk| chunk.is_final || !chunk.delta.is_empty()),
        )
    });

    Box::pin(filtered)
}

// ============================================================================
// Retry Configuration
// ============================================================================

/// Retry policy for the initial request of a completion
///
/// Only the request that opens the stream is retried; once bytes have been
/// forwarded to a caller the stream runs to completion or fails.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retry attempts (0 disables retries)
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Three retries starting at 500ms, capped at 5s
    #[must_use]
    pub const fn default_config() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }

    /// No retries, used by tests against local mock servers
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// `min(initial * 2^attempt, max)` plus up to 99ms of jitter
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self
            .initial_delay_ms
            .saturating_mul(1_u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let capped_delay = base_delay.min(self.max_delay_ms);
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::from(d.subsec_millis()))
            % 100;
        Duration::from_millis(capped_delay + jitter)
    }
}

/// Transient statuses worth retrying: 429, 502 and 503
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503)
}

/// Connection and timeout failures are retried
#[must_use]
pub fn is_retryable_request_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_feed_emits_every_frame_in_a_chunk() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_owned()),
                SseEvent::Data("{\"b\":2}".to_owned()),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn test_feed_holds_partial_line_until_terminated() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(b"data: {\"content\":\"Hel").is_empty());
        let events = buffer.feed(b"lo\"}\r\n");
        assert_eq!(events, vec![SseEvent::Data("{\"content\":\"Hello\"}".to_owned())]);
    }

    #[test]
    fn test_flush_parses_unterminated_tail() {
        let mut buffer = SseLineBuffer::new();
        buffer.feed(b": keep-alive\nevent: message\ndata: tail");
        assert_eq!(buffer.flush(), Some(SseEvent::Data("tail".to_owned())));
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_retry_policy() {
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(400));
        let config = RetryConfig::default_config();
        assert!(config.delay_for_attempt(10) < Duration::from_millis(5100));
    }

    #[tokio::test]
    async fn test_stream_reassembles_split_frames() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: Hel")),
            Ok(Bytes::from_static(b"lo\n\ndata: \n\ndata: world\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n")),
        ];
        let parsed = create_sse_stream(
            stream::iter(chunks),
            |payload| Some(Ok(StreamChunk::delta(payload))),
            "test",
        );
        let collected: Vec<StreamChunk> = parsed
            .map(|r| r.unwrap())
            .collect::<Vec<_>>()
            .await;
        let deltas: Vec<&str> = collected.iter().map(|c| c.delta.as_str()).collect();
        assert_eq!(deltas, vec!["Hello", "world", ""]);
        assert!(collected.last().unwrap().is_final);
    }
}
