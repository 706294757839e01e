//! Cleaning and single-line extraction of model responses.
//!
//! Model output arrives wrapped in reasoning blocks, code fences and chatty
//! preambles. Two passes share one stripping stage: a cheap streaming pass
//! that is re-run on every partial response, and a final pass that also
//! drops boilerplate prefixes and picks the single best commit title.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Message returned when no usable line can be extracted.
pub const FALLBACK_MESSAGE: &str = "chore: update project files";

/// Default maximum display length of a commit title.
pub const DEFAULT_MAX_LENGTH: usize = 72;

/// Marker appended to titles cut at the maximum length.
const ELLIPSIS: &str = "...";

/// Opening tag of a model reasoning block.
const REASONING_OPEN: &str = "<think>";

/// Closing tag of a model reasoning block.
const REASONING_CLOSE: &str = "</think>";

/// Longest line considered as a candidate title.
const MAX_CANDIDATE_LEN: usize = 100;

/// Shortest conventional title accepted by the first extraction rule.
const MIN_CONVENTIONAL_LEN: usize = 20;

/// Shortest line accepted by the descriptive extraction rules.
const MIN_DESCRIPTIVE_LEN: usize = 15;

/// A first line must be longer than this to be used as a last resort.
const MIN_FIRST_LINE_LEN: usize = 10;

/// Boilerplate a model commonly prepends to its answer, matched
/// case-insensitively at the start of a line.
const BOILERPLATE_PREFIXES: &[&str] = &[
    "here's a",
    "here\u{2019}s a",
    "here is a",
    "generated commit message:",
    "commit message:",
];

/// Words that suggest a title summarises several changes.
const MULTIPLICITY_WORDS: &[&str] = &["multiple", "several", "across", "and", "files", "components"];

/// Score bonuses shared by the conventional and descriptive rules.
const SUMMARY_BONUSES: &[(&str, usize)] = &[("and", 10), ("multiple", 15), ("across", 15), ("files", 10)];

/// Extra score bonuses for descriptive lines that lead with a change verb.
const VERB_BONUSES: &[(&str, usize)] = &[
    ("update", 5),
    ("improve", 5),
    ("enhance", 5),
    ("implement", 5),
    ("add", 5),
];

// Compile-time constant regex pattern
#[allow(clippy::unwrap_used)]
static FENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*`{3,}[\w+#.-]*[ \t]*\r?$\n?").unwrap());

// Compile-time constant regex pattern
#[allow(clippy::unwrap_used)]
static CONVENTIONAL_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[^\w\s]+\s*)?(?:feat|fix|docs|style|refactor|test|chore|perf|ci|build|revert)(?:\([^)]*\))?!?: \S",
    )
    .unwrap()
});

/// Streaming clean: strips reasoning blocks and fence markers, collapses
/// blank lines and trims.
///
/// Cheap and stable under repeated calls on a growing prefix of the
/// response. An unterminated reasoning block hides everything after its
/// opening tag, so partial reasoning never leaks into the projection. A
/// tail that may still grow into a reasoning tag or a fence line is held
/// back until it resolves.
pub fn clean_partial(raw: &str) -> String {
    let text = strip_reasoning(settled_prefix(raw));
    let text = FENCE_LINE.replace_all(&text, "");
    collapse_blank_lines(&text)
}

/// Drops an unfinished tail: a proper prefix of a reasoning tag at the very
/// end, or a last line that could still become a fence marker.
fn settled_prefix(raw: &str) -> &str {
    let raw = strip_partial_tag(raw);
    let line_start = raw.rfind('\n').map_or(0, |pos| pos + 1);
    if could_become_fence(&raw[line_start..]) {
        &raw[..line_start]
    } else {
        raw
    }
}

fn strip_partial_tag(raw: &str) -> &str {
    let held = [REASONING_OPEN, REASONING_CLOSE]
        .iter()
        .flat_map(|tag| (1..tag.len()).map(move |len| &tag[..len]))
        .filter(|prefix| raw.ends_with(*prefix))
        .map(str::len)
        .max()
        .unwrap_or(0);
    &raw[..raw.len() - held]
}

/// True for an unterminated line of backticks, optionally followed by an
/// info string once at least three backticks are present.
fn could_become_fence(line: &str) -> bool {
    let line = line.trim_start_matches([' ', '\t']);
    let ticks = line.len() - line.trim_start_matches('`').len();
    if ticks == 0 {
        return false;
    }
    let rest = &line[ticks..];
    if ticks < 3 {
        return rest.is_empty();
    }
    let info = rest.trim_end_matches([' ', '\t', '\r']);
    info.chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '+' | '#' | '.' | '-'))
}

/// Final clean: the streaming clean plus removal of boilerplate prefixes.
pub fn clean_final(raw: &str) -> String {
    let text = strip_reasoning(raw);
    let text = FENCE_LINE.replace_all(&text, "");
    let text = text
        .lines()
        .map(strip_boilerplate)
        .collect::<Vec<_>>()
        .join("\n");
    collapse_blank_lines(&text)
}

/// Cleans a complete response and extracts one commit title of at most
/// `max_length` characters.
///
/// Never returns an empty string: when nothing usable remains the
/// [`FALLBACK_MESSAGE`] is returned instead.
pub fn extract_commit_message(raw: &str, max_length: usize) -> String {
    let cleaned = clean_final(raw);
    let lines: Vec<&str> = cleaned
        .lines()
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .collect();

    let chosen = pick_line(&lines).unwrap_or_else(|| {
        debug!(
            raw_len = raw.len(),
            "No usable commit title in response; using fallback"
        );
        FALLBACK_MESSAGE.to_string()
    });

    enforce_max_length(&chosen, max_length)
}

/// Cuts `line` to `max_length` characters, ending in an ellipsis when cut.
pub fn enforce_max_length(line: &str, max_length: usize) -> String {
    if line.chars().count() <= max_length {
        return line.to_string();
    }
    if max_length <= ELLIPSIS.len() {
        return line.chars().take(max_length).collect();
    }
    let keep = max_length - ELLIPSIS.len();
    let mut out: String = line.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Removes the widest reasoning block: from the first opening tag to the
/// last closing tag.
fn strip_reasoning(text: &str) -> String {
    let Some(open) = text.find(REASONING_OPEN) else {
        return text.replace(REASONING_CLOSE, "");
    };

    let before = text[..open].replace(REASONING_CLOSE, "");
    let after = match text.rfind(REASONING_CLOSE) {
        Some(close) if close > open => &text[close + REASONING_CLOSE.len()..],
        _ => "",
    };
    // An opening tag after the last close is unterminated.
    let after = after.find(REASONING_OPEN).map_or(after, |pos| &after[..pos]);

    let mut out = before;
    out.push_str(after);
    out
}

/// Collapses runs of blank lines into one and trims the result.
fn collapse_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in text.lines() {
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(if blank { "" } else { line });
        previous_blank = blank;
    }
    lines.join("\n").trim().to_string()
}

/// Strips boilerplate prefixes from one line, repeatedly.
fn strip_boilerplate(line: &str) -> &str {
    let mut rest = line.trim_start();
    loop {
        let stripped = BOILERPLATE_PREFIXES.iter().find_map(|prefix| {
            let head = rest.get(..prefix.len())?;
            let tail = &rest[prefix.len()..];
            // "Here's a" must not eat the start of "Here's another".
            let splits_word = prefix.ends_with(char::is_alphabetic)
                && tail.starts_with(char::is_alphanumeric);
            (head.eq_ignore_ascii_case(prefix) && !splits_word).then(|| tail.trim_start())
        });
        match stripped {
            Some(next) => rest = next,
            None => return rest,
        }
    }
}

/// Trims a line and removes list bullets and wrapping quotes or backticks.
fn normalize_line(line: &str) -> &str {
    let mut line = line.trim();
    for bullet in ["- ", "* ", "\u{2022} "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            line = rest.trim_start();
            break;
        }
    }
    for quote in ['"', '\'', '`'] {
        if line.len() >= 2 && line.starts_with(quote) && line.ends_with(quote) {
            line = line[1..line.len() - 1].trim();
        }
    }
    line
}

/// Applies the extraction rules in preference order.
fn pick_line(lines: &[&str]) -> Option<String> {
    pick_conventional(lines)
        .or_else(|| pick_descriptive(lines))
        .or_else(|| pick_longest(lines))
        .map(str::to_string)
        .or_else(|| pick_first_line(lines))
}

/// Best-scoring conventional commit title, used only when the winner is
/// long enough to stand on its own.
fn pick_conventional<'a>(lines: &[&'a str]) -> Option<&'a str> {
    best_by_score(
        lines.iter().copied().filter(|line| {
            line.chars().count() <= MAX_CANDIDATE_LEN && CONVENTIONAL_TITLE.is_match(line)
        }),
        &[SUMMARY_BONUSES],
    )
    .filter(|line| line.chars().count() >= MIN_CONVENTIONAL_LEN)
}

/// Best-scoring `label: description` style line.
fn pick_descriptive<'a>(lines: &[&'a str]) -> Option<&'a str> {
    best_by_score(
        lines.iter().copied().filter(|line| {
            let len = line.chars().count();
            (MIN_DESCRIPTIVE_LEN..=MAX_CANDIDATE_LEN).contains(&len)
                && line.find(':').is_some_and(|pos| pos + 1 < line.len())
                && !is_comment(line)
        }),
        &[SUMMARY_BONUSES, VERB_BONUSES],
    )
}

/// Longest reasonably sized line, preferring ones that mention several
/// changes.
fn pick_longest<'a>(lines: &[&'a str]) -> Option<&'a str> {
    let in_range: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| {
            (MIN_DESCRIPTIVE_LEN..=MAX_CANDIDATE_LEN).contains(&line.chars().count())
        })
        .collect();

    longest(in_range.iter().copied().filter(|line| mentions_multiplicity(line)))
        .or_else(|| longest(in_range.iter().copied()))
}

/// First line long enough to carry meaning, templated into a conventional
/// title when it looks like a bare sentence.
fn pick_first_line(lines: &[&str]) -> Option<String> {
    let line = lines
        .iter()
        .find(|line| line.chars().count() > MIN_FIRST_LINE_LEN)?;
    if line.contains(':') || mentions_multiplicity(line) {
        return Some((*line).to_string());
    }

    let lower = line.to_lowercase();
    let kind = if lower.contains("update") {
        "chore"
    } else if lower.contains("fix") {
        "fix"
    } else if lower.contains("add") {
        "feat"
    } else {
        "chore"
    };
    let description = line.trim_end_matches('.');
    let mut chars = description.chars();
    let description = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    Some(format!("{kind}: {description}"))
}

/// Highest-scoring line; ties go to the earliest line.
fn best_by_score<'a>(
    candidates: impl Iterator<Item = &'a str>,
    bonus_tables: &[&[(&str, usize)]],
) -> Option<&'a str> {
    let mut best: Option<(usize, &str)> = None;
    for line in candidates {
        let score = score_line(line, bonus_tables);
        if best.map_or(true, |(top, _)| score > top) {
            best = Some((score, line));
        }
    }
    best.map(|(_, line)| line)
}

/// Line length plus a bonus for every table word the line contains.
fn score_line(line: &str, bonus_tables: &[&[(&str, usize)]]) -> usize {
    let words = words(line);
    let bonus: usize = bonus_tables
        .iter()
        .flat_map(|table| table.iter())
        .filter(|(word, _)| has_word(&words, word))
        .map(|(_, bonus)| bonus)
        .sum();
    line.chars().count() + bonus
}

fn longest<'a>(lines: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut best: Option<&str> = None;
    for line in lines {
        if best.map_or(true, |b| line.chars().count() > b.chars().count()) {
            best = Some(line);
        }
    }
    best
}

fn mentions_multiplicity(line: &str) -> bool {
    let words = words(line);
    MULTIPLICITY_WORDS.iter().any(|word| has_word(&words, word))
}

fn has_word(words: &[String], word: &str) -> bool {
    words.iter().any(|w| w == word)
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("//")
}

/// Lowercased alphanumeric words of a line.
fn words(line: &str) -> Vec<String> {
    line.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
