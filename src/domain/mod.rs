//! Core domain types and models
//!
//! Defines the values that flow through the pipeline (source, extracted text,
//! generation request/response, flashcards, deck) and the runtime `Config`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default deck name for cards generated from a web page.
pub const DEFAULT_URL_DECK_NAME: &str = "AI Generated Flashcards";

/// Default deck name for cards generated from a manual page.
pub const DEFAULT_MANPAGE_DECK_NAME: &str = "Man Page Flashcards";

/// Where study content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Source {
    /// A web page fetched over HTTP(S)
    Url(String),
    /// The rendered manual page of a local command
    Manpage(String),
}

impl Source {
    /// URL or command name, used in messages and prompts.
    pub fn identifier(&self) -> &str {
        match self {
            Source::Url(url) => url,
            Source::Manpage(command) => command,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Url(url) => write!(f, "{url}"),
            Source::Manpage(command) => write!(f, "man page '{command}'"),
        }
    }
}

/// How the fetched text is formatted, which decides the cleaning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Html,
    Manpage,
    PlainText,
}

/// Raw content as retrieved by the fetcher.
#[derive(Debug, Clone)]
pub struct SourceContent {
    pub origin: Source,
    pub kind: ContentKind,
    pub text: String,
    pub retrieved_at: DateTime<Utc>,
}

/// Cleaned plain text, bounded to the prompt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// URL or command name the text came from
    pub origin: String,
    pub text: String,
    /// True when the cleaned text was cut to fit the character budget
    pub truncated: bool,
}

/// Everything the model needs for one round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub text: String,
    pub count: usize,
    pub model: String,
    /// Manual-page requests get a command-line tutor persona
    pub from_manpage: bool,
}

/// Unparsed model output plus what was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    pub raw: String,
    /// Number of cards requested; parsing never yields more
    pub requested: usize,
    pub model: String,
}

/// A question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

impl Flashcard {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// A flashcard placed in a deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckCard {
    /// 1-based position within the deck
    pub id: u64,
    pub card: Flashcard,
}

/// A named, ordered collection of flashcards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub name: String,
    pub cards: Vec<DeckCard>,
}

impl Deck {
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Main configuration for ai-flashcards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Chat model identifier sent to the API
    #[serde(default = "default_model")]
    pub model: String,

    /// Cards requested from the model
    #[serde(default = "default_num_cards")]
    pub num_cards: usize,

    /// Character budget for the text embedded in the prompt
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_api_base_url", alias = "api_base")]
    pub api_base_url: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    /// Directory the `.apkg` file is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Program used to render manual pages
    #[serde(default = "default_man_program", alias = "man")]
    pub man_program: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            num_cards: default_num_cards(),
            max_chars: default_max_chars(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            api_timeout_secs: default_api_timeout_secs(),
            api_base_url: default_api_base_url(),
            temperature: None,
            output_dir: default_output_dir(),
            man_program: default_man_program(),
            user_agent: default_user_agent(),
        }
    }
}

// Default value functions for serde
fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_num_cards() -> usize {
    5
}

fn default_max_chars() -> usize {
    4000
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_api_timeout_secs() -> u64 {
    120
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_man_program() -> String {
    "man".to_string()
}

fn default_user_agent() -> String {
    format!("ai-flashcards/{}", env!("CARGO_PKG_VERSION"))
}
