//! Prompt templates for commit message generation.

/// Placeholder replaced with the budgeted diff text.
pub const DIFF_TOKEN: &str = "{{diff}}";

/// Placeholder replaced with the newline-joined list of changed files.
pub const FILES_TOKEN: &str = "{{files}}";

/// Placeholder replaced with the current branch name.
pub const BRANCH_TOKEN: &str = "{{branch}}";

/// Placeholder replaced with the emoji policy fragment.
pub const EMOJI_TOKEN: &str = "{{emoji}}";

/// System prompt sent alongside every generation request.
pub const SYSTEM_PROMPT: &str = "You are an expert software engineer who writes concise, \
accurate git commit titles. Reply with the commit title only.";

/// Emoji style guide used when emojis are enabled.
pub const EMOJI_GUIDE: &str = "\
Start the commit title with one relevant emoji in unicode format:
- \u{2728} feat: new feature
- \u{1f41b} fix: bug fix
- \u{1f4dd} docs: documentation
- \u{1f3a8} style: formatting or structure
- \u{267b}\u{fe0f} refactor: code restructuring
- \u{2705} test: tests
- \u{1f527} chore: tooling and maintenance
- \u{26a1}\u{fe0f} perf: performance
- \u{1f477} ci: continuous integration
- \u{1f4e6} build: build system or dependencies
- \u{23ea} revert: revert a previous commit";

/// Instruction used when emojis are disabled.
pub const NO_EMOJI_INSTRUCTION: &str = "Do not use emojis in the commit title.";

/// Default prompt template.
pub const DEFAULT_TEMPLATE: &str = r"Write a single-line git commit title for the changes below.

## Rules
- Use conventional commit format: <type>(<scope>): <description>
- Types: feat, fix, docs, style, refactor, test, chore, perf, ci, build, revert
- Use the imperative mood and lowercase, with no trailing period
- Keep the title under 72 characters
- When several files change, summarise the common theme rather than the first file
- Output only the commit title, without explanations or code fences

{{emoji}}

## Branch
{{branch}}

## Changed files
{{files}}

## Diff
{{diff}}
";

/// Values substituted into a prompt template.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    /// Budgeted diff text.
    pub diff: &'a str,
    /// Changed file paths.
    pub files: &'a [String],
    /// Current branch name.
    pub branch: &'a str,
    /// Whether the commit title may start with an emoji.
    pub use_emoji: bool,
}

/// Returns the emoji policy fragment for the given flag.
pub fn emoji_fragment(use_emoji: bool) -> &'static str {
    if use_emoji {
        EMOJI_GUIDE
    } else {
        NO_EMOJI_INSTRUCTION
    }
}

/// Substitutes the placeholder tokens in `template`.
///
/// Replacement is literal: substituted values are not escaped and are not
/// scanned for further tokens. Tokens absent from the template are simply
/// skipped.
pub fn build_prompt(template: &str, inputs: &PromptInputs<'_>) -> String {
    let files = inputs.files.join("\n");
    let replacements = [
        (DIFF_TOKEN, inputs.diff),
        (FILES_TOKEN, files.as_str()),
        (BRANCH_TOKEN, inputs.branch),
        (EMOJI_TOKEN, emoji_fragment(inputs.use_emoji)),
    ];

    let mut out = String::with_capacity(template.len() + inputs.diff.len());
    let mut rest = template;
    loop {
        let next = replacements
            .iter()
            .filter_map(|&(token, value)| rest.find(token).map(|pos| (pos, token, value)))
            .min_by_key(|&(pos, _, _)| pos);
        match next {
            Some((pos, token, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + token.len()..];
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }
    out
}
