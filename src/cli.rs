//! CLI interface for commit-distill.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

pub mod budget;
pub mod config;
pub mod extract;
pub mod generate;

/// commit-distill: one-line commit titles from diffs.
#[derive(Parser)]
#[command(name = "commit-distill")]
#[command(
    about = "Generate one-line commit titles from diffs with an OpenAI-compatible model",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Generates a commit title for a diff.
    Generate(generate::GenerateCommand),
    /// Shows how a diff is packed into the character budget.
    Budget(budget::BudgetCommand),
    /// Extracts a commit title from raw model output.
    Extract(extract::ExtractCommand),
    /// Configuration information.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Generate(cmd) => cmd.execute().await,
            Commands::Budget(cmd) => cmd.execute(),
            Commands::Extract(cmd) => cmd.execute(),
            Commands::Config(cmd) => cmd.execute(),
        }
    }
}

/// Reads text from `path`, or from stdin when no path is given.
pub(crate) fn read_input(path: Option<&Path>) -> Result<String> {
    read_input_from(path, &mut io::stdin().lock())
}

/// Reads text from `path`, or from `reader` when no path is given.
///
/// The reader is injected so tests can stand in for stdin.
pub(crate) fn read_input_from<R: Read>(path: Option<&Path>, reader: &mut R) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            reader
                .read_to_string(&mut text)
                .context("Failed to read from stdin")?;
            Ok(text)
        }
    }
}
