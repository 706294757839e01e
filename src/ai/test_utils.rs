//! Shared test utilities for the `ai` module.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::stream;

use super::{AiClient, AiClientMetadata, AiError, AiFuture, EventStream};

/// Event lines scripted for one streaming request.
pub(crate) type ScriptedEvents = Vec<Result<String, AiError>>;

/// Mock AI client with pre-programmed queues of responses.
///
/// Complete responses (for [`send_request`](AiClient::send_request)) and
/// scripted event streams (for [`stream_request`](AiClient::stream_request))
/// are queued separately and returned in FIFO order. When a queue is
/// exhausted, subsequent calls fail with [`AiError::EmptyResponse`].
///
/// Every call records the `(system_prompt, user_prompt)` pair so tests can
/// inspect which prompts were dispatched. Use
/// [`prompt_handle`](Self::prompt_handle) to obtain a shared handle for
/// reading the recorded prompts after the client has been moved into a
/// generator.
pub(crate) struct ConfigurableMockAiClient {
    responses: Arc<Mutex<VecDeque<Result<String, AiError>>>>,
    streams: Arc<Mutex<VecDeque<Result<ScriptedEvents, AiError>>>>,
    recorded_prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl ConfigurableMockAiClient {
    /// Creates a new mock client that will return the given responses in order.
    pub(crate) fn new(responses: Vec<Result<String, AiError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            streams: Arc::new(Mutex::new(VecDeque::new())),
            recorded_prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a mock client that will serve the given event streams in
    /// order. An `Err` entry fails the request before any event is sent.
    pub(crate) fn with_streams(streams: Vec<Result<ScriptedEvents, AiError>>) -> Self {
        let client = Self::new(Vec::new());
        client.streams.lock().unwrap().extend(streams);
        client
    }

    /// Returns a handle for inspecting which prompts were sent to the
    /// mock client after it has been moved.
    pub(crate) fn prompt_handle(&self) -> PromptRecordHandle {
        PromptRecordHandle {
            recorded_prompts: self.recorded_prompts.clone(),
        }
    }

    fn record(&self, system_prompt: &str, user_prompt: &str) {
        self.recorded_prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
    }
}

/// Builds the event lines of a successful stream from text deltas,
/// terminated by the `[DONE]` sentinel.
pub(crate) fn sse_events(deltas: &[&str]) -> ScriptedEvents {
    deltas
        .iter()
        .map(|delta| {
            Ok(format!(
                "data: {}",
                serde_json::json!({"choices": [{"delta": {"content": delta}}]})
            ))
        })
        .chain(std::iter::once(Ok("data: [DONE]".to_string())))
        .collect()
}

/// Shared handle to a mock client's recorded prompts.
pub(crate) struct PromptRecordHandle {
    recorded_prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl PromptRecordHandle {
    /// Returns all recorded `(system_prompt, user_prompt)` pairs.
    pub(crate) fn prompts(&self) -> Vec<(String, String)> {
        self.recorded_prompts.lock().unwrap().clone()
    }

    /// Returns the number of AI requests that were made.
    pub(crate) fn request_count(&self) -> usize {
        self.recorded_prompts.lock().unwrap().len()
    }
}

impl AiClient for ConfigurableMockAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> AiFuture<'a, String> {
        self.record(system_prompt, user_prompt);
        let next = self.responses.lock().unwrap().pop_front();
        Box::pin(async move { next.unwrap_or(Err(AiError::EmptyResponse)) })
    }

    fn stream_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> AiFuture<'a, EventStream> {
        self.record(system_prompt, user_prompt);
        let next = self.streams.lock().unwrap().pop_front();
        Box::pin(async move {
            let events = next.unwrap_or(Err(AiError::EmptyResponse))?;
            let stream: EventStream = Box::pin(stream::iter(events));
            Ok(stream)
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: "Mock".to_string(),
            model: "mock-model".to_string(),
        }
    }
}
