//! Deck building and the `.apkg` container.

mod apkg;
mod schema;

pub use apkg::{read_deck, serialize};

use crate::domain::{Deck, DeckCard, Flashcard};
use crate::error::{Error, Result};
use crate::utils::sanitize_file_stem;
use std::path::{Path, PathBuf};

/// Extension of the file Anki imports.
pub const DECK_FILE_EXTENSION: &str = "apkg";

/// Assemble a deck, numbering cards by position starting at 1.
pub fn build(name: &str, cards: Vec<Flashcard>) -> Result<Deck> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Config("deck name must not be empty".to_string()));
    }
    let cards = cards
        .into_iter()
        .zip(1u64..)
        .map(|(card, id)| DeckCard { id, card })
        .collect();
    Ok(Deck { name: name.to_string(), cards })
}

/// `<deck name>.apkg`, made safe for the filesystem.
pub fn file_name_for(name: &str) -> String {
    format!("{}.{DECK_FILE_EXTENSION}", sanitize_file_stem(name))
}

pub fn output_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(file_name_for(name))
}

#[cfg(test)]
mod tests {
    use super::{build, file_name_for, output_path};
    use crate::domain::Flashcard;
    use crate::error::Error;
    use std::path::{Path, PathBuf};

    #[test]
    fn assigns_positions_as_ids() {
        let deck = build(
            "  Rust  ",
            vec![Flashcard::new("q1", "a1"), Flashcard::new("q2", "a2")],
        )
        .expect("deck");
        assert_eq!(deck.name, "Rust");
        let ids: Vec<u64> = deck.cards.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(deck.cards[1].card.question, "q2");
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(matches!(build(" ", Vec::new()), Err(Error::Config(_))));
    }

    #[test]
    fn file_name_uses_deck_name() {
        assert_eq!(file_name_for("AI Generated Flashcards"), "AI Generated Flashcards.apkg");
        assert_eq!(file_name_for("tar/gzip"), "tar_gzip.apkg");
        assert_eq!(output_path(Path::new("out"), "x"), PathBuf::from("out/x.apkg"));
    }
}
