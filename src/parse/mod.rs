//! Response parsing: split raw model output into flashcards.
//!
//! The expected format is `question::answer` pairs joined by `||`. A segment that
//! does not split into exactly one non-empty question and one non-empty answer is
//! logged and skipped; the rest of the batch is kept.

use crate::domain::{Flashcard, GenerationResponse};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Separates one flashcard from the next.
pub const PAIR_DELIMITER: &str = "||";

/// Separates a question from its answer.
pub const QA_DELIMITER: &str = "::";

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d{1,3}[.)]|[-*•])\s+").expect("valid regex"));

const QUESTION_LABELS: &[&str] = &["question:", "q:"];
const ANSWER_LABELS: &[&str] = &["answer:", "a:"];

/// Parse `response` into at most `response.requested` flashcards, in order.
pub fn parse(response: &GenerationResponse) -> Vec<Flashcard> {
    let mut cards = parse_raw(&response.raw);
    if cards.len() > response.requested {
        debug!(
            parsed = cards.len(),
            requested = response.requested,
            "model returned more flashcards than requested; keeping the first ones"
        );
        cards.truncate(response.requested);
    }
    cards
}

/// Parse every well-formed flashcard in `raw`.
pub fn parse_raw(raw: &str) -> Vec<Flashcard> {
    if raw.contains(PAIR_DELIMITER) {
        return parse_segments(raw.split(PAIR_DELIMITER));
    }
    if raw.contains(QA_DELIMITER) {
        // Pairs on separate lines without the pair delimiter.
        return parse_segments(raw.lines());
    }
    parse_labeled_lines(raw)
}

fn parse_segments<'a>(segments: impl Iterator<Item = &'a str>) -> Vec<Flashcard> {
    segments
        .enumerate()
        .filter_map(|(idx, segment)| parse_segment(idx + 1, segment))
        .collect()
}

fn parse_segment(position: usize, segment: &str) -> Option<Flashcard> {
    let segment = segment.trim();
    if segment.is_empty() {
        return None;
    }

    let parts: Vec<&str> = segment.split(QA_DELIMITER).collect();
    let [question, answer] = parts.as_slice() else {
        warn!(
            position,
            delimiters = parts.len() - 1,
            segment = %preview(segment),
            "skipping flashcard: expected exactly one '::'"
        );
        return None;
    };

    build_card(position, question, answer)
}

/// The original free-form layout: a `Question: ...` line followed by an `Answer: ...` line.
fn parse_labeled_lines(raw: &str) -> Vec<Flashcard> {
    let mut cards = Vec::new();
    let mut question: Option<String> = None;

    for (idx, line) in raw.lines().enumerate() {
        let line = LIST_MARKER.replace(line.trim(), "");
        if let Some(rest) = strip_label(&line, QUESTION_LABELS) {
            match find_label(rest, ANSWER_LABELS) {
                Some((q, a)) => cards.extend(build_card(idx + 1, q, a)),
                None => question = Some(rest.to_string()),
            }
        } else if let Some(answer) = strip_label(&line, ANSWER_LABELS) {
            match question.take() {
                Some(q) => cards.extend(build_card(idx + 1, &q, answer)),
                None => warn!(line = idx + 1, "skipping answer without a preceding question"),
            }
        }
    }
    cards
}

fn build_card(position: usize, question: &str, answer: &str) -> Option<Flashcard> {
    let question = clean_question(question);
    let answer = clean_answer(answer);
    if question.is_empty() || answer.is_empty() {
        warn!(position, "skipping flashcard with an empty question or answer");
        return None;
    }
    Some(Flashcard::new(question, answer))
}

fn clean_question(text: &str) -> String {
    let text = LIST_MARKER.replace(text.trim(), "");
    let text: &str = text.as_ref();
    strip_label(text, QUESTION_LABELS).unwrap_or(text).trim().to_string()
}

fn clean_answer(text: &str) -> String {
    let text = text.trim();
    strip_label(text, ANSWER_LABELS).unwrap_or(text).trim().to_string()
}

/// `text` without a leading case-insensitive label, if it has one.
fn strip_label<'a>(text: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels.iter().find_map(|label| {
        let head = text.get(..label.len())?;
        head.eq_ignore_ascii_case(label).then(|| text[label.len()..].trim())
    })
}

/// Split a one-line `Question: .. Answer: ..` at its answer label.
///
/// A full label only needs a preceding space; a bare `A:` must follow a sentence
/// break (`?`, `.`, `!` or a double space) so `plan a:` inside a question is kept.
fn find_label<'a>(text: &'a str, labels: &[&str]) -> Option<(&'a str, &'a str)> {
    let lower = text.to_ascii_lowercase();
    labels.iter().find_map(|label| {
        lower.match_indices(*label).find_map(|(idx, _)| {
            let before = &text[..idx];
            let at_boundary =
                if label.len() > 2 { before.ends_with(' ') } else { follows_sentence_break(before) };
            at_boundary.then(|| (before.trim_end(), &text[idx + label.len()..]))
        })
    })
}

fn follows_sentence_break(before: &str) -> bool {
    before.ends_with("  ")
        || (before.ends_with(' ') && before.trim_end().ends_with(['?', '.', '!']))
}

fn preview(segment: &str) -> String {
    const MAX: usize = 60;
    let mut out: String = segment.chars().take(MAX).collect();
    if segment.chars().count() > MAX {
        out.push('…');
    }
    out
}
