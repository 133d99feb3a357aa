//! Whitespace and footer cleanup for extracted text.

use std::sync::LazyLock;

use regex::Regex;

static POST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\d+").expect("post number pattern is valid"));

/// Line prefixes left behind by edit footers and reaction bars.
const NOISE_PREFIXES: &[&str] = &["Last edited:", "Son düzenleme:", "Reactions:", "Tepkiler:"];

/// Quote-expander labels that leak into post text.
const EXPANDER_LABELS: &[&str] = &["Click to expand...", "Tıkla ve genişlet..."];

/// Normalize an extracted text field.
///
/// Non-breaking spaces become plain spaces, each line is trimmed, and
/// blank lines, short `#<n>` post numbers and edit/reaction footers are
/// dropped before the remaining lines are rejoined with `\n`.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let text = text.trim().replace('\u{a0}', " ");

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_noise_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_noise_line(line: &str) -> bool {
    if line.chars().count() < 10 && POST_NUMBER.is_match(line) {
        return true;
    }
    NOISE_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}

/// Remove quote-expander labels from post content.
#[must_use]
pub fn strip_expander_labels(text: &str) -> String {
    EXPANDER_LABELS
        .iter()
        .fold(text.to_string(), |acc, label| acc.replace(label, ""))
}

/// Cut `text` to at most `limit` characters, appending `marker` when cut.
#[must_use]
pub fn truncate_chars(text: &str, limit: usize, marker: &str) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{marker}", &text[..byte_idx]),
        None => text.to_string(),
    }
}
