//! ai-flashcards: turn web pages and man pages into Anki decks
//!
//! The pipeline fetches a source, extracts bounded plain text, asks an
//! OpenAI-compatible chat model for question/answer pairs, parses the reply
//! and writes the cards as an `.apkg` package.

pub mod cli;
pub mod config;
pub mod deck;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod generate;
pub mod parse;
pub mod pipeline;
pub mod utils;

pub use error::{Error, Result};
