//! Incremental assembly of a streamed model response.
//!
//! [`StreamState`] tracks one response as events arrive: it accumulates
//! the raw text, re-runs the streaming clean after each delta and reports
//! the projection whenever it changes. [`assemble`] drives a state from an
//! [`EventStream`] and runs the final extraction once the stream ends.

use futures::StreamExt;
use tracing::{debug, warn};

use super::clean::{clean_partial, extract_commit_message};
use crate::ai::stream::{parse_event_line, EventStream, StreamEvent};
use crate::ai::AiError;

/// Lifecycle of a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// No event consumed yet.
    Idle,
    /// At least one event consumed; more may follow.
    Accumulating,
    /// The stream ended and the final message was produced.
    Done,
    /// The stream failed before any text arrived.
    Failed,
}

/// Progress reported while a response streams in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamUpdate<'a> {
    /// The cleaned projection of everything received so far.
    Partial(&'a str),
    /// The extracted commit title. Reported exactly once, last.
    Final(&'a str),
}

/// Accumulated state of one streamed response.
#[derive(Debug)]
pub struct StreamState {
    phase: StreamPhase,
    raw: String,
    projection: String,
    max_length: usize,
    deltas: usize,
    skipped: usize,
    terminated: bool,
}

impl StreamState {
    /// Creates an idle state whose final title is cut at `max_length`.
    pub fn new(max_length: usize) -> Self {
        Self {
            phase: StreamPhase::Idle,
            raw: String::new(),
            projection: String::new(),
            max_length,
            deltas: 0,
            skipped: 0,
            terminated: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Raw text received so far.
    pub fn raw_text(&self) -> &str {
        &self.raw
    }

    /// Latest cleaned projection.
    pub fn projection(&self) -> &str {
        &self.projection
    }

    /// Number of text deltas received.
    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    /// Whether the end-of-stream sentinel has been seen.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Consumes one event line.
    ///
    /// Returns the new projection when the line changed it. Malformed
    /// payloads are logged and skipped.
    pub fn push_line(&mut self, line: &str) -> Option<&str> {
        if self.phase == StreamPhase::Idle {
            self.phase = StreamPhase::Accumulating;
        }
        match parse_event_line(line) {
            StreamEvent::Delta(delta) => self.push_delta(&delta),
            StreamEvent::Done => {
                self.terminated = true;
                None
            }
            StreamEvent::Ignored => None,
            StreamEvent::Malformed(reason) => {
                self.skipped += 1;
                debug!(reason = %reason, line_len = line.len(), "Skipping malformed stream event");
                None
            }
        }
    }

    /// Appends a text delta and recomputes the projection.
    ///
    /// Returns the projection when it is non-empty and differs from the
    /// previous one.
    pub fn push_delta(&mut self, delta: &str) -> Option<&str> {
        if self.phase == StreamPhase::Idle {
            self.phase = StreamPhase::Accumulating;
        }
        self.deltas += 1;
        self.raw.push_str(delta);

        let projection = clean_partial(&self.raw);
        if projection.is_empty() || projection == self.projection {
            return None;
        }
        self.projection = projection;
        Some(&self.projection)
    }

    /// Marks the response as failed.
    pub fn fail(&mut self) {
        self.phase = StreamPhase::Failed;
    }

    /// Runs the final extraction over the accumulated text.
    pub fn finish(&mut self) -> String {
        self.phase = StreamPhase::Done;
        let message = extract_commit_message(&self.raw, self.max_length);
        debug!(
            deltas = self.deltas,
            skipped = self.skipped,
            raw_len = self.raw.len(),
            message_len = message.len(),
            "Finished assembling streamed response"
        );
        message
    }
}

/// Drives `events` to completion and returns the extracted commit title.
///
/// Each changed projection is reported as [`StreamUpdate::Partial`] in the
/// order events arrive, then the title is reported once as
/// [`StreamUpdate::Final`]. A transport error before any text arrived is
/// returned as-is with nothing reported; an error after that ends the
/// stream early and the text received so far is finalized. The event
/// stream is dropped on every exit path.
pub async fn assemble<F>(
    mut events: EventStream,
    max_length: usize,
    mut on_progress: F,
) -> Result<String, AiError>
where
    F: FnMut(StreamUpdate<'_>),
{
    let mut state = StreamState::new(max_length);

    while let Some(item) = events.next().await {
        match item {
            Ok(line) => {
                if let Some(projection) = state.push_line(&line) {
                    on_progress(StreamUpdate::Partial(projection));
                }
                if state.is_terminated() {
                    break;
                }
            }
            Err(err) if state.delta_count() > 0 => {
                warn!(
                    error = %err,
                    deltas = state.delta_count(),
                    "Stream ended early; finalizing partial response"
                );
                break;
            }
            Err(err) => {
                state.fail();
                return Err(err);
            }
        }
    }
    drop(events);

    let message = state.finish();
    on_progress(StreamUpdate::Final(&message));
    Ok(message)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use futures::stream;

    use super::*;
    use crate::ai::test_utils::sse_events;
    use crate::commit::clean::{clean_final, DEFAULT_MAX_LENGTH, FALLBACK_MESSAGE};

    fn events(items: Vec<Result<String, AiError>>) -> EventStream {
        Box::pin(stream::iter(items))
    }

    fn delta_line(text: &str) -> Result<String, AiError> {
        Ok(format!(
            "data: {}",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        ))
    }

    /// Runs `assemble` and returns (result, partials, finals).
    async fn run(
        items: Vec<Result<String, AiError>>,
    ) -> (Result<String, AiError>, Vec<String>, Vec<String>) {
        let mut partials = Vec::new();
        let mut finals = Vec::new();
        let result = assemble(events(items), DEFAULT_MAX_LENGTH, |update| match update {
            StreamUpdate::Partial(text) => partials.push(text.to_string()),
            StreamUpdate::Final(text) => finals.push(text.to_string()),
        })
        .await;
        (result, partials, finals)
    }

    // ── StreamState ────────────────────────────────────────────

    #[test]
    fn starts_idle() {
        let state = StreamState::new(72);
        assert_eq!(state.phase(), StreamPhase::Idle);
        assert_eq!(state.projection(), "");
    }

    #[test]
    fn first_line_moves_to_accumulating() {
        let mut state = StreamState::new(72);
        assert_eq!(state.push_line(": keep-alive"), None);
        assert_eq!(state.phase(), StreamPhase::Accumulating);
    }

    #[test]
    fn unchanged_projection_is_not_reported() {
        let mut state = StreamState::new(72);
        assert_eq!(state.push_delta("feat: x"), Some("feat: x"));
        // Trailing whitespace is trimmed away by the streaming clean.
        assert_eq!(state.push_delta("\n\n"), None);
        assert_eq!(state.raw_text(), "feat: x\n\n");
    }

    #[test]
    fn reasoning_is_hidden_until_closed() {
        let mut state = StreamState::new(72);
        assert_eq!(state.push_delta("<think>plan"), None);
        assert_eq!(state.push_delta(" more</think>"), None);
        assert_eq!(state.push_delta("fix: y"), Some("fix: y"));
    }

    #[test]
    fn finish_moves_to_done() {
        let mut state = StreamState::new(72);
        state.push_delta("feat(api): add pagination to list endpoints");
        assert_eq!(state.finish(), "feat(api): add pagination to list endpoints");
        assert_eq!(state.phase(), StreamPhase::Done);
    }

    // ── assemble ───────────────────────────────────────────────

    #[tokio::test]
    async fn hello_world_sequence() {
        let (result, partials, finals) = run(sse_events(&["Hello", " world"])).await;
        assert_eq!(partials, vec!["Hello", "Hello world"]);
        assert_eq!(finals.len(), 1);
        assert_eq!(result.unwrap(), finals[0]);
        assert_eq!(finals[0], extract_commit_message("Hello world", DEFAULT_MAX_LENGTH));
        assert_eq!(clean_final("Hello world"), "Hello world");
    }

    #[tokio::test]
    async fn split_reasoning_tag_never_flickers() {
        let (result, partials, _) =
            run(sse_events(&["<", "think>plan</think>", "feat: add x and y"])).await;
        assert_eq!(partials, vec!["feat: add x and y"]);
        assert_eq!(result.unwrap(), "feat: add x and y");
    }

    #[tokio::test]
    async fn split_fence_marker_never_flickers() {
        let (_, partials, _) =
            run(sse_events(&["``", "`text\nfix: handle", " empty input"])).await;
        assert_eq!(partials, vec!["fix: handle", "fix: handle empty input"]);
    }

    #[tokio::test]
    async fn malformed_event_is_skipped() {
        let (result, partials, _) = run(vec![
            delta_line("fix: handle"),
            Ok("data: {not json".to_string()),
            delta_line(" empty input in parser"),
            Ok("data: [DONE]".to_string()),
        ])
        .await;
        assert_eq!(partials, vec!["fix: handle", "fix: handle empty input in parser"]);
        assert_eq!(result.unwrap(), "fix: handle empty input in parser");
    }

    #[tokio::test]
    async fn exhaustion_without_sentinel_finalizes() {
        let (result, partials, finals) =
            run(vec![delta_line("docs: describe config options in readme")]).await;
        assert_eq!(partials.len(), 1);
        assert_eq!(finals.len(), 1);
        assert_eq!(result.unwrap(), "docs: describe config options in readme");
    }

    #[tokio::test]
    async fn events_after_sentinel_are_not_consumed() {
        let (result, partials, _) = run(vec![
            delta_line("chore: bump dependency versions"),
            Ok("data: [DONE]".to_string()),
            delta_line(" and more"),
        ])
        .await;
        assert_eq!(partials, vec!["chore: bump dependency versions"]);
        assert_eq!(result.unwrap(), "chore: bump dependency versions");
    }

    #[tokio::test]
    async fn error_before_any_text_fails_without_progress() {
        let (result, partials, finals) =
            run(vec![Err(AiError::NetworkError("reset".to_string()))]).await;
        assert!(matches!(result, Err(AiError::NetworkError(_))));
        assert!(partials.is_empty());
        assert!(finals.is_empty());
    }

    #[tokio::test]
    async fn error_after_text_finalizes_partial_response() {
        let (result, partials, finals) = run(vec![
            delta_line("refactor(core): split allocator into passes"),
            Err(AiError::NetworkError("reset".to_string())),
        ])
        .await;
        assert_eq!(partials.len(), 1);
        assert_eq!(finals.len(), 1);
        assert_eq!(result.unwrap(), "refactor(core): split allocator into passes");
    }

    #[tokio::test]
    async fn empty_stream_yields_fallback() {
        let (result, partials, finals) = run(vec![Ok("data: [DONE]".to_string())]).await;
        assert!(partials.is_empty());
        assert_eq!(finals, vec![FALLBACK_MESSAGE]);
        assert_eq!(result.unwrap(), FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn final_title_respects_max_length() {
        let long = "feat: ".to_string() + &"x".repeat(120);
        let mut finals = Vec::new();
        let result = assemble(events(sse_events(&[long.as_str()])), 40, |update| {
            if let StreamUpdate::Final(text) = update {
                finals.push(text.to_string());
            }
        })
        .await
        .unwrap();
        assert_eq!(result.chars().count(), 40);
        assert!(result.ends_with("..."));
        assert_eq!(finals, vec![result]);
    }
}
