//! Per-file unified diff segmentation.

use tracing::debug;

/// Marker that begins a per-file section in unified diff output.
const FILE_DIFF_MARKER: &str = "diff --git ";

/// Path reported when neither side of a marker line can be parsed.
pub const UNKNOWN_PATH: &str = "unknown";

/// A per-file slice of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSegment {
    /// Path of the file, taken from the `b/` side of the marker line when
    /// present, otherwise the `a/` side.
    pub file_path: String,
    /// Raw text of this file's diff (header + all hunks).
    pub text: String,
    /// Character count of `text`.
    pub char_len: usize,
}

impl DiffSegment {
    /// Creates a segment, caching its character count.
    pub fn new(file_path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            file_path: file_path.into(),
            char_len: text.chars().count(),
            text,
        }
    }
}

/// Result of segmenting a raw diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentedDiff {
    /// One segment per file, in order of appearance.
    Files(Vec<DiffSegment>),
    /// Input with no file-boundary markers; budgeted by flat truncation.
    Unstructured(String),
}

impl SegmentedDiff {
    /// Returns the file paths in order of appearance.
    ///
    /// Unstructured input has no paths.
    pub fn file_paths(&self) -> Vec<String> {
        match self {
            Self::Files(segments) => segments.iter().map(|s| s.file_path.clone()).collect(),
            Self::Unstructured(_) => Vec::new(),
        }
    }

    /// Returns the total character count of the segmented text.
    pub fn char_len(&self) -> usize {
        match self {
            Self::Files(segments) => segments.iter().map(|s| s.char_len).sum(),
            Self::Unstructured(text) => text.chars().count(),
        }
    }
}

/// Splits a raw unified diff at `diff --git` line boundaries.
///
/// Any text before the first marker stays attached to the first segment so
/// the concatenation of all segments reproduces the input exactly. Input
/// that contains no marker at all is returned as
/// [`SegmentedDiff::Unstructured`]; an empty or whitespace-only input
/// yields no segments.
pub fn segment(diff: &str) -> SegmentedDiff {
    if diff.trim().is_empty() {
        return SegmentedDiff::Files(Vec::new());
    }

    let mut positions = Vec::new();
    let mut offset = 0;
    for line in diff.split_inclusive('\n') {
        if line.starts_with(FILE_DIFF_MARKER) {
            positions.push(offset);
        }
        offset += line.len();
    }

    if positions.is_empty() {
        debug!(
            diff_len = diff.len(),
            "No file-boundary markers found; treating diff as unstructured"
        );
        return SegmentedDiff::Unstructured(diff.to_string());
    }

    // Preamble (e.g. `git show` commit headers) rides along with the first file.
    positions[0] = 0;

    let segments: Vec<DiffSegment> = positions
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = positions.get(i + 1).copied().unwrap_or(diff.len());
            let text = &diff[start..end];
            let marker_line = text
                .split_inclusive('\n')
                .find(|line| line.starts_with(FILE_DIFF_MARKER))
                .unwrap_or("");
            DiffSegment::new(extract_path_from_diff_header(marker_line), text)
        })
        .collect();

    debug!(segment_count = segments.len(), "Segmented diff by file");
    SegmentedDiff::Files(segments)
}

/// Extracts the file path from a `diff --git a/<old> b/<new>` marker line.
///
/// Prefers the `b/` side, falls back to the `a/` side, and finally to
/// [`UNKNOWN_PATH`].
fn extract_path_from_diff_header(header_line: &str) -> String {
    let rest = header_line
        .trim_end_matches(['\n', '\r'])
        .strip_prefix(FILE_DIFF_MARKER)
        .unwrap_or("")
        .trim();

    // Find the last " b/" to handle paths that may contain spaces.
    if let Some(b_pos) = rest.rfind(" b/") {
        let new_path = &rest[b_pos + 3..];
        if !new_path.is_empty() {
            return new_path.to_string();
        }
    }

    if let Some(old_path) = rest.strip_prefix("a/") {
        let old_path = old_path
            .split_once(" b/")
            .map_or(old_path, |(path, _)| path)
            .trim();
        if !old_path.is_empty() {
            return old_path.to_string();
        }
    }

    UNKNOWN_PATH.to_string()
}
