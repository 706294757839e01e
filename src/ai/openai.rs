//! OpenAI-compatible API client implementation (works with OpenAI, Ollama,
//! OpenRouter, etc.)

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::provider::AiProvider;
use super::stream::{lines_from_bytes, EventStream};
use super::{build_http_client, check_error_response, AiClient, AiClientMetadata, AiError, AiFuture};

/// OpenAI API request message
#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// OpenAI API request body
#[derive(Serialize, Debug)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

/// OpenAI API response choice
#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ResponseMessage>,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

/// OpenAI API response message
#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI API response
#[derive(Deserialize, Debug)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

/// OpenAI API usage statistics
#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiClient {
    /// HTTP client for API requests
    client: Client,
    /// Provider this client talks to
    provider: AiProvider,
    /// API key for authentication (optional for Ollama)
    api_key: Option<String>,
    /// Model identifier
    model: String,
    /// Full chat-completions endpoint
    endpoint: Url,
    /// Maximum tokens for responses
    max_tokens: Option<u32>,
    /// Temperature for response generation
    temperature: Option<f32>,
}

impl OpenAiClient {
    /// Creates a client, validating `base_url`.
    pub fn new(
        provider: AiProvider,
        model: String,
        api_key: Option<String>,
        base_url: &str,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<Self, AiError> {
        let endpoint = chat_completions_url(base_url)?;
        debug!(base_url = %base_url, full_url = %endpoint, "Constructed OpenAI-compatible API URL");

        Ok(Self {
            client: build_http_client()?,
            provider,
            api_key,
            model,
            endpoint,
            max_tokens,
            temperature,
        })
    }

    /// Returns the chat-completions endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn build_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
        stream: bool,
    ) -> OpenAiRequest<'a> {
        // System prompt first, then user prompt.
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(Message {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(Message {
            role: "user",
            content: user_prompt,
        });

        OpenAiRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream,
        }
    }

    async fn post(&self, request: &OpenAiRequest<'_>) -> Result<reqwest::Response, AiError> {
        debug!(
            max_tokens = ?request.max_tokens,
            temperature = ?request.temperature,
            message_count = request.messages.len(),
            stream = request.stream,
            "Built OpenAI-compatible request payload"
        );
        info!(url = %self.endpoint, model = %self.model, "Sending request to OpenAI-compatible API");

        let mut req_builder = self.client.post(self.endpoint.clone()).json(request);
        if request.stream {
            req_builder = req_builder.header("Accept", "text/event-stream");
        }
        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder.send().await?;
        check_error_response(response).await
    }
}

impl AiClient for OpenAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> AiFuture<'a, String> {
        Box::pin(async move {
            debug!(
                system_prompt_len = system_prompt.len(),
                user_prompt_len = user_prompt.len(),
                model = %self.model,
                provider = %self.provider,
                "Preparing OpenAI-compatible API request"
            );

            let request = self.build_request(system_prompt, user_prompt, false);
            let body = self.post(&request).await?.text().await?;
            if body.trim().is_empty() {
                return Err(AiError::EmptyResponse);
            }

            let openai_response: OpenAiResponse = serde_json::from_str(&body)
                .map_err(|e| AiError::InvalidResponseFormat(e.to_string()))?;

            debug!(
                choice_count = openai_response.choices.len(),
                model = ?openai_response.model,
                usage = ?openai_response.usage,
                "Received OpenAI-compatible API response"
            );

            let text = openai_response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message)
                .and_then(|message| message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or(AiError::NoContent)?;

            debug!(
                response_len = text.len(),
                "Successfully extracted text content from OpenAI-compatible API response"
            );
            Ok(text)
        })
    }

    fn stream_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> AiFuture<'a, EventStream> {
        Box::pin(async move {
            debug!(
                system_prompt_len = system_prompt.len(),
                user_prompt_len = user_prompt.len(),
                model = %self.model,
                provider = %self.provider,
                "Preparing streaming OpenAI-compatible API request"
            );

            let request = self.build_request(system_prompt, user_prompt, true);
            let response = self.post(&request).await?;
            Ok(lines_from_bytes(response.bytes_stream()))
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: self.provider.to_string(),
            model: self.model.clone(),
        }
    }
}

/// Builds the chat-completions URL from a base URL.
///
/// A base that already ends in `/v1` (as OpenRouter's does) only gets
/// `/chat/completions` appended.
fn chat_completions_url(base_url: &str) -> Result<Url, AiError> {
    let invalid = |reason: String| {
        AiError::InvalidConfiguration(format!("invalid base URL {base_url:?}: {reason}"))
    };

    let parsed = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", parsed.scheme())));
    }

    let base = parsed.as_str().trim_end_matches('/');
    let full = if parsed.path().trim_end_matches('/').ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    };
    Url::parse(&full).map_err(|e| invalid(e.to_string()))
}
