//! Error type shared by the AI transport and the generation pipeline.

use thiserror::Error;

/// Errors raised while configuring or talking to a model endpoint.
#[derive(Error, Debug)]
pub enum AiError {
    /// No API key found for a provider that requires one.
    #[error("API key not found. Set OPENAI_API_KEY, or USE_OLLAMA=true for a local model")]
    ApiKeyNotFound,

    /// Endpoint or generation settings are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The endpoint answered with a non-success status.
    #[error("API request failed: HTTP {status}: {body}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Connection, timeout or body-read failure.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The endpoint returned an empty body.
    #[error("Empty response from API")]
    EmptyResponse,

    /// The response parsed but carried no message content.
    #[error("No content in API response")]
    NoContent,

    /// The response body could not be parsed.
    #[error("Invalid response format from API: {0}")]
    InvalidResponseFormat(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError(err.to_string())
    }
}
