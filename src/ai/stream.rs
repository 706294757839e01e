//! Server-sent event decoding for streamed chat completions.
//!
//! A streamed response is a sequence of newline-terminated lines. Lines of
//! interest look like `data: {"choices":[{"delta":{"content":"..."}}]}`;
//! the literal `data: [DONE]` ends the stream. Everything else (blank
//! separators, `event:` fields, `:` keep-alive comments) carries no text.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use super::error::AiError;

/// Prefix of an SSE data field.
const DATA_PREFIX: &str = "data:";

/// Payload that terminates a stream.
const DONE_SENTINEL: &str = "[DONE]";

/// A stream of raw event lines, without their line terminators.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<String, AiError>> + Send>>;

/// Interpretation of a single event line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty text delta.
    Delta(String),
    /// The end-of-stream sentinel.
    Done,
    /// A line that carries no text (blank, comment, non-data field, or a
    /// chunk without content such as a role announcement).
    Ignored,
    /// A data line whose payload could not be parsed.
    Malformed(String),
}

#[derive(Deserialize, Debug)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize, Debug)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Debug, Default)]
struct ChunkDelta {
    content: Option<String>,
}

/// Parses one event line into a [`StreamEvent`].
pub fn parse_event_line(line: &str) -> StreamEvent {
    let line = line.trim();
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return StreamEvent::Ignored;
    };
    let payload = payload.trim_start();
    if payload == DONE_SENTINEL {
        return StreamEvent::Done;
    }
    if payload.is_empty() {
        return StreamEvent::Ignored;
    }

    match serde_json::from_str::<ChunkPayload>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map_or(StreamEvent::Ignored, StreamEvent::Delta),
        Err(e) => StreamEvent::Malformed(e.to_string()),
    }
}

/// Splits a byte stream into lines.
///
/// Bytes are buffered until a newline arrives, so lines and multi-byte
/// characters split across chunk boundaries are reassembled. A trailing
/// line without a terminator is emitted when the byte stream ends. A
/// transport error is forwarded once and ends the line stream.
pub fn lines_from_bytes<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<AiError> + Send + 'static,
{
    let decoder = LineDecoder {
        inner: Box::pin(bytes),
        buffer: Vec::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(line) = decoder.ready.pop_front() {
                return Some((Ok(line), decoder));
            }
            if decoder.finished {
                return None;
            }
            match decoder.inner.next().await {
                Some(Ok(chunk)) => decoder.push(chunk.as_ref()),
                Some(Err(err)) => {
                    decoder.finished = true;
                    return Some((Err(err.into()), decoder));
                }
                None => {
                    decoder.finished = true;
                    decoder.flush();
                }
            }
        }
    }))
}

struct LineDecoder<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    ready: VecDeque<String>,
    finished: bool,
}

impl<S> LineDecoder<S> {
    fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.ready.push_back(decode_line(&line));
        }
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.ready.push_back(decode_line(&line));
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}
