//! Unified diff handling.

pub mod diff_split;

pub use diff_split::{segment, DiffSegment, SegmentedDiff, UNKNOWN_PATH};
