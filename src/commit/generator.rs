//! End-to-end commit title generation.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::budget::allocate_diff;
use super::clean::{extract_commit_message, DEFAULT_MAX_LENGTH};
use super::prompt::{build_prompt, PromptInputs, DEFAULT_TEMPLATE, SYSTEM_PROMPT};
use super::stream::{assemble, StreamUpdate};
use crate::ai::{AiClient, AiError};
use crate::git::segment;

/// Default diff budget in characters.
pub const DEFAULT_BUDGET: usize = 12_000;

/// Default response token limit.
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Smallest usable maximum title length: one character plus the ellipsis.
pub const MIN_MAX_LENGTH: usize = 4;

/// Generation settings, passed explicitly to each generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Diff budget in characters.
    pub budget: usize,
    /// Maximum commit title length in characters.
    pub max_length: usize,
    /// Whether the title may start with an emoji.
    pub use_emoji: bool,
    /// Prompt template with `{{diff}}`, `{{files}}`, `{{branch}}` and
    /// `{{emoji}}` placeholders.
    pub template: String,
    /// Response token limit passed to the model.
    pub max_tokens: u32,
    /// Sampling temperature passed to the model.
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            max_length: DEFAULT_MAX_LENGTH,
            use_emoji: false,
            template: DEFAULT_TEMPLATE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl GenerationConfig {
    /// Rejects settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<(), AiError> {
        if self.max_length < MIN_MAX_LENGTH {
            return Err(AiError::InvalidConfiguration(format!(
                "max_length must be at least {MIN_MAX_LENGTH}, got {}",
                self.max_length
            )));
        }
        if self.template.trim().is_empty() {
            return Err(AiError::InvalidConfiguration(
                "prompt template is empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AiError::InvalidConfiguration(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Generates one-line commit titles from diffs.
pub struct CommitMessageGenerator {
    /// AI client implementation.
    client: Box<dyn AiClient>,
    config: GenerationConfig,
}

impl CommitMessageGenerator {
    /// Creates a generator, validating `config`.
    pub fn new(client: Box<dyn AiClient>, config: GenerationConfig) -> Result<Self, AiError> {
        config.validate()?;
        Ok(Self { client, config })
    }

    /// Returns the generation settings.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Builds the user prompt for a diff.
    ///
    /// The diff is segmented and fitted to the budget first. When `files`
    /// is empty the segment paths are listed instead.
    pub fn build_user_prompt(&self, diff: &str, files: &[String], branch: &str) -> String {
        let segmented = segment(diff);
        let allocation = allocate_diff(&segmented, self.config.budget);
        if allocation.was_reduced() {
            info!(
                original_len = segmented.char_len(),
                budget = self.config.budget,
                truncated = allocation.truncated.len(),
                omitted = allocation.omitted.len(),
                "Diff reduced to fit budget"
            );
        }

        let listed;
        let files = if files.is_empty() {
            listed = segmented.file_paths();
            listed.as_slice()
        } else {
            files
        };

        build_prompt(
            &self.config.template,
            &PromptInputs {
                diff: &allocation.text,
                files,
                branch,
                use_emoji: self.config.use_emoji,
            },
        )
    }

    /// Generates a commit title with a single non-streaming request.
    pub async fn generate(
        &self,
        diff: &str,
        files: &[String],
        branch: &str,
    ) -> Result<String, AiError> {
        let prompt = self.build_user_prompt(diff, files, branch);
        self.log_request(&prompt, false);

        let response = self.client.send_request(SYSTEM_PROMPT, &prompt).await?;
        Ok(extract_commit_message(&response, self.config.max_length))
    }

    /// Generates a commit title from a streamed response, reporting
    /// progress through `on_progress`.
    pub async fn generate_streaming<F>(
        &self,
        diff: &str,
        files: &[String],
        branch: &str,
        on_progress: F,
    ) -> Result<String, AiError>
    where
        F: FnMut(StreamUpdate<'_>),
    {
        let prompt = self.build_user_prompt(diff, files, branch);
        self.log_request(&prompt, true);

        let events = self.client.stream_request(SYSTEM_PROMPT, &prompt).await?;
        assemble(events, self.config.max_length, on_progress).await
    }

    fn log_request(&self, prompt: &str, streaming: bool) {
        let metadata = self.client.get_metadata();
        debug!(
            provider = %metadata.provider,
            model = %metadata.model,
            prompt_len = prompt.len(),
            streaming,
            "Requesting commit title"
        );
    }
}
