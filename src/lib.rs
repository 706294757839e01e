//! # commit-distill
//!
//! Turns a unified diff into a single conventional-commit title using an
//! OpenAI-compatible chat model.
//!
//! The pipeline has four stages:
//!
//! - [`git::segment`] splits a raw diff into per-file segments.
//! - [`commit::budget`] packs the segments into a character budget,
//!   truncating or omitting the largest files.
//! - [`commit::prompt`] fills a prompt template.
//! - [`commit::stream`] and [`commit::clean`] assemble the (optionally
//!   streamed) response and extract one clean title.
//!
//! ## Quick Start
//!
//! ```rust
//! use commit_distill::commit::extract_commit_message;
//!
//! let title = extract_commit_message("<think>hmm</think>\nfix: handle empty input", 72);
//! assert_eq!(title, "fix: handle empty input");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod ai;
pub mod cli;
pub mod commit;
pub mod git;
pub mod utils;

pub use crate::cli::Cli;

/// The current version of commit-distill.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
