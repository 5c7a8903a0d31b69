//! Utility functions

use sha2::{Digest, Sha256};

/// Rough token estimate (~4 characters per token) used for progress output.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Take at most `max_chars` characters from the front of `text`.
///
/// Returns the prefix and whether anything was cut. Always splits on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// Turn a deck name into a file stem that is safe on common filesystems.
pub fn sanitize_file_stem(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = replaced.trim_start_matches('.').trim();
    if stem.is_empty() {
        "deck".to_string()
    } else {
        stem.to_string()
    }
}

/// Deterministic 64-bit value derived from `parts` with SHA-256.
pub fn stable_hash_u64(parts: &[&str]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
