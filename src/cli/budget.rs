//! `budget` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::commit::allocate_diff;
use crate::git::segment;
use crate::utils::settings::Settings;

/// Shows how a diff is packed into the character budget.
#[derive(Parser)]
pub struct BudgetCommand {
    /// Reads the diff from this file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub diff: Option<PathBuf>,

    /// Diff budget in characters (defaults to the configured budget).
    #[arg(long)]
    pub budget: Option<usize>,

    /// Prints a per-file placement report to stderr.
    #[arg(long)]
    pub stats: bool,
}

impl BudgetCommand {
    /// Executes the budget command.
    pub fn execute(self) -> Result<()> {
        let budget = match self.budget {
            Some(budget) => budget,
            None => Settings::load()?.generation.budget,
        };
        let diff = super::read_input(self.diff.as_deref())?;

        let segmented = segment(&diff);
        let allocation = allocate_diff(&segmented, budget);
        print!("{}", allocation.text);

        if self.stats {
            eprintln!(
                "budget: {budget}, input: {} chars, output: {} chars",
                segmented.char_len(),
                allocation.text.chars().count()
            );
            for (label, paths) in [
                ("whole", &allocation.whole),
                ("truncated", &allocation.truncated),
                ("omitted", &allocation.omitted),
            ] {
                if !paths.is_empty() {
                    eprintln!("{label}: {}", paths.join(", "));
                }
            }
        }
        Ok(())
    }
}
