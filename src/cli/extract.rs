//! `extract` command.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use crate::commit::{clean_partial, extract_commit_message, MIN_MAX_LENGTH};
use crate::utils::settings::Settings;

/// Extracts a commit title from raw model output.
#[derive(Parser)]
pub struct ExtractCommand {
    /// Reads the model output from this file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Maximum title length in characters (defaults to the configured value).
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Prints the streaming projection instead of the extracted title.
    #[arg(long)]
    pub partial: bool,
}

impl ExtractCommand {
    /// Executes the extract command.
    pub fn execute(self) -> Result<()> {
        let raw = super::read_input(self.input.as_deref())?;
        if self.partial {
            println!("{}", clean_partial(&raw));
            return Ok(());
        }

        let max_length = match self.max_length {
            Some(max_length) => max_length,
            None => Settings::load()?.generation.max_length,
        };
        let max_length = check_max_length(max_length)?;
        println!("{}", extract_commit_message(&raw, max_length));
        Ok(())
    }
}

/// Rejects title limits too small to hold a character and the ellipsis.
fn check_max_length(max_length: usize) -> Result<usize> {
    if max_length < MIN_MAX_LENGTH {
        bail!("--max-length must be at least {MIN_MAX_LENGTH}, got {max_length}");
    }
    Ok(max_length)
}
