//! ai-flashcards: generate Anki flashcard decks from web pages and man pages
//!
//! Fetches the source, asks a chat model for flashcards and writes an `.apkg`
//! file that Anki can import.

use anyhow::Result;

fn main() -> Result<()> {
    ai_flashcards::cli::run()
}
