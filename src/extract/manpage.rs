//! Rendered man page cleanup.

use super::normalize_lines;
use once_cell::sync::Lazy;
use regex::Regex;

/// `x\bx` (bold) and `_\bx` (underline) overstrike pairs: drop the char before the backspace.
static OVERSTRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s).\x08").expect("valid regex"));

/// CSI sequences (SGR colours etc.) and OSC sequences (hyperlinks).
static ANSI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)")
        .expect("valid regex")
});

/// `LS(1)   User Commands   LS(1)`: captures the page tag.
static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\S+\(\w+\))\s.*\S+\(\w+\)\s*$").expect("valid regex"));

/// Gap between the columns of a header or footer line.
static COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

/// Strip terminal formatting and the header/footer lines from `man` output.
pub fn clean_manpage(raw: &str) -> String {
    let text = OVERSTRIKE.replace_all(raw, "");
    let text = ANSI.replace_all(&text, "");
    let text = text.replace('\r', "");

    let mut lines: Vec<&str> = text.lines().collect();
    drop_header_and_footer(&mut lines);
    normalize_lines(&lines.join("\n"), false)
}

fn drop_header_and_footer(lines: &mut Vec<&str>) {
    let Some(first) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return;
    };
    let Some(tag) = HEADER.captures(lines[first]).map(|c| c[1].to_string()) else {
        return;
    };
    lines.remove(first);

    if let Some(last) = lines.iter().rposition(|l| !l.trim().is_empty()) {
        if is_footer(lines[last], &tag) {
            lines.remove(last);
        }
    }
}

/// man-db footers end with the page tag; mandoc and BSD footers repeat the OS
/// name in the first and last column (`macOS 14.5   May 31, 2006   macOS 14.5`).
fn is_footer(line: &str, tag: &str) -> bool {
    let line = line.trim();
    if line.ends_with(tag) {
        return true;
    }
    let columns: Vec<&str> = COLUMN_GAP.split(line).collect();
    columns.len() >= 2 && columns.first() == columns.last()
}
