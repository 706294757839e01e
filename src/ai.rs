//! AI client trait and shared transport helpers.

pub mod error;
pub mod openai;
pub mod provider;
pub mod stream;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_utils;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;

pub use error::AiError;
pub use openai::OpenAiClient;
pub use provider::{AiProvider, ProviderConfig};
pub use stream::{parse_event_line, EventStream, StreamEvent};

/// HTTP request timeout for AI API calls.
///
/// Covers the whole exchange, including a streamed body.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Boxed future returned by [`AiClient`] methods.
pub type AiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AiError>> + Send + 'a>>;

/// Metadata about an AI client implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AiClientMetadata {
    /// Service provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
}

// ── Shared helpers for AI client implementations ────────────────────

/// Builds an HTTP client with the standard request timeout.
pub(crate) fn build_http_client() -> Result<Client, AiError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AiError::InvalidConfiguration(format!("failed to build HTTP client: {e}")))
}

/// Checks an HTTP response for error status and returns a structured error
/// if non-success.
///
/// On success, returns the response unchanged for further processing.
/// On failure, reads the error body and returns
/// [`AiError::ApiRequestFailed`].
pub(crate) async fn check_error_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, AiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_else(|e| {
        tracing::debug!("Failed to read error response body: {e}");
        String::new()
    });
    Err(AiError::ApiRequestFailed { status, body })
}

/// Trait for AI service clients.
pub trait AiClient: Send + Sync {
    /// Sends a request and returns the complete response text.
    fn send_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str)
        -> AiFuture<'a, String>;

    /// Sends a streaming request and returns its event lines.
    ///
    /// The returned future resolves once the response headers have been
    /// accepted; transport failures after that point surface as errors in
    /// the stream itself.
    fn stream_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> AiFuture<'a, EventStream>;

    /// Returns metadata about the AI client implementation.
    fn get_metadata(&self) -> AiClientMetadata;
}
