//! Text extraction: turn fetched HTML or man output into bounded plain text.

mod html;
mod manpage;

pub use html::html_to_text;
pub use manpage::clean_manpage;

use crate::domain::{ContentKind, ExtractedText, SourceContent};
use crate::error::{Error, Result};
use crate::utils::truncate_chars;
use tracing::debug;

/// Clean `content` for prompting and cut it to `max_chars` characters.
///
/// Truncation keeps a prefix; there is no summarization.
pub fn extract(content: &SourceContent, max_chars: usize) -> Result<ExtractedText> {
    let origin = content.origin.identifier().to_string();
    let cleaned = match content.kind {
        ContentKind::Html => html_to_text(&content.text),
        ContentKind::Manpage => clean_manpage(&content.text),
        ContentKind::PlainText => normalize_lines(&content.text, true),
    };

    let (prefix, truncated) = truncate_chars(&cleaned, max_chars);
    let text = prefix.trim_end();
    if text.trim().is_empty() {
        return Err(Error::EmptyContent(origin));
    }

    debug!(
        origin = %origin,
        raw_bytes = content.text.len(),
        cleaned_chars = cleaned.chars().count(),
        truncated,
        "extracted text"
    );
    Ok(ExtractedText { origin, text: text.to_string(), truncated })
}

/// Trim line ends (and starts, when `trim_start`), drop leading/trailing blank
/// lines and squeeze runs of blank lines down to one.
pub(crate) fn normalize_lines(text: &str, trim_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;
    for line in text.lines() {
        let line = if trim_start { line.trim() } else { line.trim_end() };
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if pending_blank {
            out.push('\n');
            pending_blank = false;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}
