//! `generate` command.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use crate::ai::ProviderConfig;
use crate::commit::{CommitMessageGenerator, GenerationConfig, StreamUpdate};
use crate::utils::settings::Settings;

/// Branch name used in the prompt when none is given.
const DEFAULT_BRANCH: &str = "unknown";

/// Generates a commit title for a diff.
#[derive(Parser)]
pub struct GenerateCommand {
    /// Reads the diff from this file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub diff: Option<PathBuf>,

    /// Current branch name, shown to the model.
    #[arg(long)]
    pub branch: Option<String>,

    /// Changed files (comma-separated); defaults to the paths in the diff.
    #[arg(long, value_delimiter = ',')]
    pub files: Vec<String>,

    /// Prompt template file with {{diff}}, {{files}}, {{branch}} and
    /// {{emoji}} placeholders.
    #[arg(long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Allows a leading emoji in the title.
    #[arg(long, overrides_with = "no_emoji")]
    pub emoji: bool,

    /// Forbids emojis in the title.
    #[arg(long, overrides_with = "emoji")]
    pub no_emoji: bool,

    /// Waits for the complete response instead of streaming it.
    #[arg(long)]
    pub no_stream: bool,

    /// Diff budget in characters.
    #[arg(long)]
    pub budget: Option<usize>,

    /// Maximum title length in characters.
    #[arg(long)]
    pub max_length: Option<usize>,

    /// AI model to use (overrides environment configuration).
    #[arg(long)]
    pub model: Option<String>,

    /// Response token limit.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arg(long)]
    pub temperature: Option<f32>,
}

impl GenerateCommand {
    /// Executes the generate command.
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load()?;
        let config = self.resolve_config(settings.generation.clone())?;

        let diff = super::read_input(self.diff.as_deref())?;
        if diff.trim().is_empty() {
            bail!("No diff provided. Pipe a diff on stdin or pass --diff <FILE>");
        }

        let provider = ProviderConfig::resolve(&settings, self.model.as_deref())?;
        let client = provider.build_client(Some(config.max_tokens), Some(config.temperature))?;
        info!(provider = %provider.provider, model = %provider.model, "Using AI provider");

        let generator = CommitMessageGenerator::new(Box::new(client), config)?;
        let branch = self.branch.as_deref().unwrap_or(DEFAULT_BRANCH);

        let generation = async {
            if self.no_stream {
                generator.generate(&diff, &self.files, branch).await
            } else {
                let mut progress = ProgressLine::new(io::stderr().is_terminal());
                generator
                    .generate_streaming(&diff, &self.files, branch, |update| {
                        progress.render(update);
                    })
                    .await
            }
        };

        // Dropping the generation future on Ctrl-C closes the stream.
        let message = tokio::select! {
            result = generation => result.context("Failed to generate commit message")?,
            _ = tokio::signal::ctrl_c() => bail!("Generation cancelled"),
        };

        println!("{message}");
        Ok(())
    }

    /// Applies command-line overrides to the settings defaults.
    fn resolve_config(&self, mut config: GenerationConfig) -> Result<GenerationConfig> {
        if let Some(path) = &self.template {
            config.template = fs::read_to_string(path)
                .with_context(|| format!("Failed to read template {}", path.display()))?;
        }
        if self.emoji {
            config.use_emoji = true;
        }
        if self.no_emoji {
            config.use_emoji = false;
        }
        if let Some(budget) = self.budget {
            config.budget = budget;
        }
        if let Some(max_length) = self.max_length {
            config.max_length = max_length;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        Ok(config)
    }
}

/// Renders streaming progress as a single rewritten stderr line.
struct ProgressLine {
    enabled: bool,
    shown: bool,
}

impl ProgressLine {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            shown: false,
        }
    }

    fn render(&mut self, update: StreamUpdate<'_>) {
        if !self.enabled {
            return;
        }
        let mut stderr = io::stderr().lock();
        // Progress output is best-effort; a closed stderr must not fail generation.
        let _ = match update {
            StreamUpdate::Partial(text) => {
                self.shown = true;
                let last = text.lines().last().unwrap_or_default();
                write!(stderr, "\r\x1b[2K{last}").and_then(|()| stderr.flush())
            }
            StreamUpdate::Final(_) if self.shown => writeln!(stderr, "\r\x1b[2K"),
            StreamUpdate::Final(_) => Ok(()),
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        cmd: GenerateCommand,
    }

    fn parse(args: &[&str]) -> GenerateCommand {
        let mut argv = vec!["generate"];
        argv.extend_from_slice(args);
        Harness::try_parse_from(argv).unwrap().cmd
    }

    #[test]
    fn no_flags_keep_settings() {
        let base = GenerationConfig {
            budget: 5_000,
            use_emoji: true,
            ..GenerationConfig::default()
        };
        let config = parse(&[]).resolve_config(base.clone()).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn flags_override_settings() {
        let config = parse(&[
            "--budget",
            "2000",
            "--max-length",
            "50",
            "--max-tokens",
            "128",
            "--temperature",
            "0.7",
            "--emoji",
        ])
        .resolve_config(GenerationConfig::default())
        .unwrap();
        assert_eq!(config.budget, 2000);
        assert_eq!(config.max_length, 50);
        assert_eq!(config.max_tokens, 128);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.use_emoji);
    }

    #[test]
    fn last_emoji_flag_wins() {
        let cmd = parse(&["--emoji", "--no-emoji"]);
        let config = cmd
            .resolve_config(GenerationConfig {
                use_emoji: true,
                ..GenerationConfig::default()
            })
            .unwrap();
        assert!(!config.use_emoji);
    }

    #[test]
    fn files_are_comma_separated() {
        let cmd = parse(&["--files", "a.rs,b.rs", "--files", "c.rs"]);
        assert_eq!(cmd.files, vec!["a.rs", "b.rs", "c.rs"]);
    }

    #[test]
    fn template_is_read_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("template.txt");
        fs::write(&path, "Title for {{diff}}").unwrap();

        let config = parse(&["--template", path.to_str().unwrap()])
            .resolve_config(GenerationConfig::default())
            .unwrap();
        assert_eq!(config.template, "Title for {{diff}}");
    }

    #[test]
    fn missing_template_is_an_error() {
        let err = parse(&["--template", "/nonexistent/template.txt"])
            .resolve_config(GenerationConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read template"));
    }
}
