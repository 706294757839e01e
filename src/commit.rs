//! Commit title generation: diff budgeting, prompting and response cleanup.

pub mod budget;
pub mod clean;
pub mod generator;
pub mod prompt;
pub mod stream;

pub use budget::{allocate, allocate_diff, AllocatedDiff};
pub use clean::{clean_final, clean_partial, extract_commit_message, FALLBACK_MESSAGE};
pub use generator::{CommitMessageGenerator, GenerationConfig, MIN_MAX_LENGTH};
pub use prompt::{build_prompt, PromptInputs, DEFAULT_TEMPLATE};
pub use stream::{assemble, StreamPhase, StreamState, StreamUpdate};
