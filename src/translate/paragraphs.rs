//! Paragraph cap: limits reply content to a fixed number of
//! blank-line-delimited paragraphs.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Paragraph count used when the cap is enabled without an explicit value.
pub const DEFAULT_MAX_PARAGRAPHS: usize = 4;

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\n+").expect("valid regex"));

/// Split `content` on runs of two or more newlines and drop fragments that
/// are blank after trimming. Fragments themselves are not trimmed.
pub fn split_paragraphs(content: &str) -> Vec<&str> {
    PARAGRAPH_BREAK
        .split(content)
        .filter(|p| !p.trim().is_empty())
        .collect()
}

/// Keep at most `max` paragraphs, rejoined with a single blank line.
///
/// Content with `max` paragraphs or fewer is returned untouched.
pub fn cap_paragraphs(content: &str, max: usize) -> Cow<'_, str> {
    let paragraphs = split_paragraphs(content);
    if paragraphs.len() <= max {
        return Cow::Borrowed(content);
    }

    tracing::info!(
        from = paragraphs.len(),
        to = max,
        "Trimmed response paragraphs"
    );
    Cow::Owned(paragraphs[..max].join("\n\n"))
}
