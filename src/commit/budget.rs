//! Fair-share packing of per-file diffs into a character budget.
//!
//! Fits a commit's per-file diffs into one prompt-sized budget without
//! starving any file. Small segments are included whole in ascending size
//! order while they stay under a slack-adjusted fair share of what is left;
//! the larger remainder splits the leftover budget evenly and is truncated
//! per file, keeping headers and hunk markers so the model still sees the
//! outline of every change. Files that cannot get a useful minimum share
//! are omitted and named in a trailing summary.

use tracing::{debug, info};

use crate::git::diff_split::{DiffSegment, SegmentedDiff};

/// Characters held back from the packing budget for the omitted-files
/// summary line.
pub const SUMMARY_RESERVE: usize = 150;

/// Multiplier on the fair share so slightly-larger-than-average files can
/// still be included whole.
const FAIR_SHARE_SLACK: f64 = 1.5;

/// Smallest allocation a truncated file may receive before it is omitted
/// instead.
pub const MIN_FILE_ALLOCATION: usize = 250;

/// Fraction of a truncated file's allocation available to header lines.
const HEADER_SHARE: f64 = 0.30;

/// Characters held back from a truncated file's allocation for the
/// "lines not shown" note.
const TRUNCATION_NOTE_RESERVE: usize = 60;

/// Line prefixes that belong to a file header (before the first hunk).
const FILE_HEADER_PREFIXES: &[&str] = &[
    "index ",
    "--- ",
    "+++ ",
    "new file mode",
    "deleted file mode",
    "old mode",
    "new mode",
    "similarity index",
    "dissimilarity index",
    "rename from",
    "rename to",
    "copy from",
    "copy to",
    "Binary files",
];

/// Outcome of packing a diff into a budget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatedDiff {
    /// The diff text to place into the prompt.
    pub text: String,
    /// Paths included without modification.
    pub whole: Vec<String>,
    /// Paths included with their body truncated.
    pub truncated: Vec<String>,
    /// Paths dropped entirely and named in the summary.
    pub omitted: Vec<String>,
}

impl AllocatedDiff {
    /// Returns `true` when the input was reduced in any way.
    pub fn was_reduced(&self) -> bool {
        !self.truncated.is_empty() || !self.omitted.is_empty()
    }
}

/// How one segment ends up in the packed output.
#[derive(Debug, Clone)]
enum Placement {
    Whole,
    Truncated(String),
    Omitted,
}

/// Packs the segments into `budget` characters and returns the diff text.
pub fn allocate(segments: &[DiffSegment], budget: usize) -> String {
    pack_segments(segments, budget).text
}

/// Packs a segmented diff, flat-truncating input that has no file
/// boundaries.
pub fn allocate_diff(diff: &SegmentedDiff, budget: usize) -> AllocatedDiff {
    match diff {
        SegmentedDiff::Files(segments) => pack_segments(segments, budget),
        SegmentedDiff::Unstructured(text) => AllocatedDiff {
            text: truncate_flat(text, budget),
            ..AllocatedDiff::default()
        },
    }
}

/// Packs per-file segments into `budget` characters.
///
/// Output keeps the original file order. When everything fits the segments
/// are concatenated unchanged and no summary is added.
pub fn pack_segments(segments: &[DiffSegment], budget: usize) -> AllocatedDiff {
    let total: usize = segments.iter().map(|s| s.char_len).sum();
    if total <= budget {
        return AllocatedDiff {
            text: segments.iter().map(|s| s.text.as_str()).collect(),
            whole: segments.iter().map(|s| s.file_path.clone()).collect(),
            ..AllocatedDiff::default()
        };
    }

    let working = budget.saturating_sub(SUMMARY_RESERVE);
    let mut order: Vec<usize> = (0..segments.len()).collect();
    order.sort_by_key(|&i| segments[i].char_len);

    let mut placements = vec![Placement::Omitted; segments.len()];
    let mut remaining = working;
    let mut placed = 0;

    // Ascending order means the first miss ends the pass: every later
    // segment is at least as large against the same fair share.
    for &idx in &order {
        let unplaced = order.len() - placed;
        let fair_share = (remaining as f64 / unplaced as f64 * FAIR_SHARE_SLACK) as usize;
        let len = segments[idx].char_len;
        if len > fair_share || len > remaining {
            break;
        }
        placements[idx] = Placement::Whole;
        remaining -= len;
        placed += 1;
    }

    // A summary naming every unplaced file must still fit.
    while placed > 0 && summary_overflow(segments, &order[placed..]) > remaining {
        placed -= 1;
        let idx = order[placed];
        placements[idx] = Placement::Omitted;
        remaining += segments[idx].char_len;
    }

    let oversized = &order[placed..];
    let (kept, per_file) = fit_oversized(segments, oversized, remaining);
    for &idx in &kept {
        placements[idx] = Placement::Truncated(truncate_segment(&segments[idx], per_file));
    }

    debug!(
        budget,
        total_chars = total,
        whole = placed,
        truncated = kept.len(),
        omitted = oversized.len() - kept.len(),
        per_file_allocation = per_file,
        "Packed diff segments into budget"
    );

    let mut result = AllocatedDiff::default();
    for (segment, placement) in segments.iter().zip(placements) {
        match placement {
            Placement::Whole => {
                result.text.push_str(&segment.text);
                result.whole.push(segment.file_path.clone());
            }
            Placement::Truncated(text) => {
                result.text.push_str(&text);
                result.truncated.push(segment.file_path.clone());
            }
            Placement::Omitted => result.omitted.push(segment.file_path.clone()),
        }
    }

    if !result.omitted.is_empty() {
        let names: Vec<&str> = result.omitted.iter().map(String::as_str).collect();
        if !result.text.is_empty() && !result.text.ends_with('\n') {
            result.text.push('\n');
        }
        result.text.push_str(&omission_summary(&names));
        info!(
            omitted = result.omitted.len(),
            "Omitted files that could not fit the diff budget"
        );
    }

    result
}

/// Decides which oversized segments (sorted ascending) are truncated and
/// included, and the even per-file allocation they get.
///
/// Files are dropped largest-first until every kept file clears
/// [`MIN_FILE_ALLOCATION`]. A file whose first header line plus the note
/// reserve cannot fit the allocation is dropped as well. A summary that
/// outgrows [`SUMMARY_RESERVE`] borrows the overflow from the truncation
/// budget.
fn fit_oversized(
    segments: &[DiffSegment],
    oversized: &[usize],
    remaining: usize,
) -> (Vec<usize>, usize) {
    let mut kept: Vec<usize> = oversized.to_vec();
    while !kept.is_empty() {
        let omitted: Vec<usize> = oversized
            .iter()
            .copied()
            .filter(|idx| !kept.contains(idx))
            .collect();
        let available = remaining.saturating_sub(summary_overflow(segments, &omitted));
        let per_file = available / kept.len();
        if per_file < MIN_FILE_ALLOCATION {
            kept.pop();
            continue;
        }

        let unfit = kept
            .iter()
            .enumerate()
            .filter(|&(_, &idx)| minimum_truncated_len(&segments[idx]) > per_file)
            .max_by_key(|&(_, &idx)| minimum_truncated_len(&segments[idx]))
            .map(|(pos, _)| pos);
        match unfit {
            Some(pos) => {
                kept.remove(pos);
            }
            None => return (kept, per_file),
        }
    }
    (Vec::new(), 0)
}

/// Characters by which the summary for `omitted` exceeds
/// [`SUMMARY_RESERVE`], counting the newline that may precede it.
fn summary_overflow(segments: &[DiffSegment], omitted: &[usize]) -> usize {
    if omitted.is_empty() {
        return 0;
    }
    let names: Vec<&str> = omitted
        .iter()
        .map(|&i| segments[i].file_path.as_str())
        .collect();
    (omission_summary(&names).chars().count() + 1).saturating_sub(SUMMARY_RESERVE)
}

/// Smallest output [`truncate_segment`] can produce: the first line, which
/// is always kept, plus the note.
fn minimum_truncated_len(segment: &DiffSegment) -> usize {
    segment
        .text
        .split_inclusive('\n')
        .next()
        .map_or(0, |line| line.chars().count())
        + TRUNCATION_NOTE_RESERVE
}

/// Builds the trailing summary line naming omitted files.
fn omission_summary(paths: &[&str]) -> String {
    let noun = if paths.len() == 1 { "file" } else { "files" };
    format!(
        "[{} {noun} omitted to fit the diff budget: {}]\n",
        paths.len(),
        paths.join(", ")
    )
}

/// Truncates one file's diff to at most `allocation` characters.
///
/// Header lines (file header and `@@` hunk headers) are kept in place up to
/// 30% of the allocation, the first one always. Body lines follow in order
/// until the allocation minus the note reserve is used, and a note records
/// roughly how many added and removed lines were left out.
pub fn truncate_segment(segment: &DiffSegment, allocation: usize) -> String {
    if segment.char_len <= allocation {
        return segment.text.clone();
    }

    let lines: Vec<&str> = segment.text.split_inclusive('\n').collect();
    let is_header = classify_header_lines(&lines);
    let header_cap = (allocation as f64 * HEADER_SHARE) as usize;

    let mut keep_header = vec![false; lines.len()];
    let mut header_used = 0;
    for (i, line) in lines.iter().enumerate() {
        if !is_header[i] {
            continue;
        }
        let len = line.chars().count();
        if header_used == 0 || header_used + len <= header_cap {
            keep_header[i] = true;
            header_used += len;
        }
    }

    let body_budget = allocation
        .saturating_sub(TRUNCATION_NOTE_RESERVE)
        .saturating_sub(header_used);
    let mut out = String::new();
    let mut body_used = 0;
    let mut body_exhausted = false;
    let mut hidden_additions = 0;
    let mut hidden_deletions = 0;

    for (i, line) in lines.iter().enumerate() {
        if is_header[i] {
            if keep_header[i] {
                out.push_str(line);
            }
            continue;
        }
        let len = line.chars().count();
        if !body_exhausted && body_used + len <= body_budget {
            out.push_str(line);
            body_used += len;
            continue;
        }
        body_exhausted = true;
        if line.starts_with('+') {
            hidden_additions += 1;
        } else if line.starts_with('-') {
            hidden_deletions += 1;
        }
    }

    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&format!(
        "[... ~{hidden_additions} added / ~{hidden_deletions} removed lines not shown]\n"
    ));
    out
}

/// Marks which lines are header lines.
///
/// `---`/`+++`/`index` style lines only count as headers before the first
/// hunk so that removed lines starting with `--` are not misread.
fn classify_header_lines(lines: &[&str]) -> Vec<bool> {
    let mut in_hunk = false;
    lines
        .iter()
        .map(|line| {
            if line.starts_with("diff --git ") {
                in_hunk = false;
                true
            } else if line.starts_with("@@") {
                in_hunk = true;
                true
            } else if in_hunk {
                false
            } else {
                FILE_HEADER_PREFIXES.iter().any(|p| line.starts_with(p))
            }
        })
        .collect()
}

/// Cuts text with no file structure at `budget` characters.
pub fn truncate_flat(text: &str, budget: usize) -> String {
    let total = text.chars().count();
    if total <= budget {
        return text.to_string();
    }

    let keep = budget.saturating_sub(TRUNCATION_NOTE_RESERVE);
    let cut = text.char_indices().nth(keep).map_or(text.len(), |(i, _)| i);
    let mut out = text[..cut].to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&format!("[... {} characters truncated]\n", total - keep));
    out
}
