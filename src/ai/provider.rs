//! Provider selection from environment variables and settings.
//!
//! `USE_OLLAMA=true` selects a local Ollama endpoint that needs no key;
//! otherwise an OpenAI-compatible endpoint is used and `OPENAI_API_KEY` is
//! required. `OPENAI_BASE_URL` lets the OpenAI path target any compatible
//! service (OpenRouter, a proxy, a self-hosted gateway).

use std::fmt;

use tracing::debug;

use super::error::AiError;
use super::openai::OpenAiClient;
use crate::utils::settings::Settings;

/// Default OpenAI endpoint.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Model used when `OPENAI_MODEL` is unset.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Model used when `OLLAMA_MODEL` is unset.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// AI provider types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    /// OpenAI or any OpenAI-compatible hosted API.
    OpenAi,
    /// Local Ollama.
    Ollama,
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "OpenAI"),
            Self::Ollama => write!(f, "Ollama"),
        }
    }
}

/// Resolved endpoint and credentials for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Selected provider.
    pub provider: AiProvider,
    /// Model identifier.
    pub model: String,
    /// Endpoint base URL.
    pub base_url: String,
    /// Bearer token, absent for Ollama.
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Resolves the provider from the environment, falling back to the
    /// `env` section of `settings`.
    pub fn resolve(settings: &Settings, model_override: Option<&str>) -> Result<Self, AiError> {
        Self::resolve_with(|key| settings.get_env_var(key), model_override)
    }

    /// Resolves the provider using `lookup` for every variable.
    pub fn resolve_with<F>(lookup: F, model_override: Option<&str>) -> Result<Self, AiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let use_ollama = lookup("USE_OLLAMA").is_some_and(|val| val == "true");

        let config = if use_ollama {
            Self {
                provider: AiProvider::Ollama,
                model: model_override
                    .map(String::from)
                    .or_else(|| lookup("OLLAMA_MODEL"))
                    .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                base_url: lookup("OLLAMA_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
                api_key: None,
            }
        } else {
            let api_key = lookup("OPENAI_API_KEY")
                .filter(|key| !key.trim().is_empty())
                .ok_or(AiError::ApiKeyNotFound)?;
            Self {
                provider: AiProvider::OpenAi,
                model: model_override
                    .map(String::from)
                    .or_else(|| lookup("OPENAI_MODEL"))
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                base_url: lookup("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                api_key: Some(api_key),
            }
        };

        debug!(
            provider = %config.provider,
            model = %config.model,
            base_url = %config.base_url,
            "Resolved AI provider"
        );
        Ok(config)
    }

    /// Builds an OpenAI-compatible client for this provider.
    pub fn build_client(
        &self,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<OpenAiClient, AiError> {
        OpenAiClient::new(
            self.provider,
            self.model.clone(),
            self.api_key.clone(),
            &self.base_url,
            max_tokens,
            temperature,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn openai_requires_key() {
        let err = ProviderConfig::resolve_with(lookup_from(&[]), None).unwrap_err();
        assert!(matches!(err, AiError::ApiKeyNotFound));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let err =
            ProviderConfig::resolve_with(lookup_from(&[("OPENAI_API_KEY", "  ")]), None).unwrap_err();
        assert!(matches!(err, AiError::ApiKeyNotFound));
    }

    #[test]
    fn openai_defaults() {
        let config =
            ProviderConfig::resolve_with(lookup_from(&[("OPENAI_API_KEY", "sk-test")]), None)
                .unwrap();
        assert_eq!(config.provider, AiProvider::OpenAi);
        assert_eq!(config.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn openai_compatible_base_url_and_model() {
        let config = ProviderConfig::resolve_with(
            lookup_from(&[
                ("OPENAI_API_KEY", "sk-or"),
                ("OPENAI_BASE_URL", "https://openrouter.ai/api/v1"),
                ("OPENAI_MODEL", "anthropic/claude-3.5-haiku"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.model, "anthropic/claude-3.5-haiku");
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = ProviderConfig::resolve_with(
            lookup_from(&[("USE_OLLAMA", "true"), ("OLLAMA_MODEL", "qwen2.5-coder")]),
            None,
        )
        .unwrap();
        assert_eq!(config.provider, AiProvider::Ollama);
        assert_eq!(config.model, "qwen2.5-coder");
        assert_eq!(config.base_url, DEFAULT_OLLAMA_BASE_URL);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn use_ollama_must_be_exactly_true() {
        let err = ProviderConfig::resolve_with(lookup_from(&[("USE_OLLAMA", "yes")]), None)
            .unwrap_err();
        assert!(matches!(err, AiError::ApiKeyNotFound));
    }

    #[test]
    fn model_override_wins() {
        let config = ProviderConfig::resolve_with(
            lookup_from(&[("OPENAI_API_KEY", "k"), ("OPENAI_MODEL", "gpt-4o")]),
            Some("gpt-4.1-nano"),
        )
        .unwrap();
        assert_eq!(config.model, "gpt-4.1-nano");
    }

    #[test]
    fn build_client_rejects_bad_base_url() {
        let config = ProviderConfig {
            provider: AiProvider::Ollama,
            model: "m".to_string(),
            base_url: "not a url".to_string(),
            api_key: None,
        };
        assert!(matches!(
            config.build_client(None, None),
            Err(AiError::InvalidConfiguration(_))
        ));
    }
}
