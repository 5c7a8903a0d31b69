//! The end-to-end run: fetch, extract, generate, parse, build, write.

use crate::deck;
use crate::domain::{Deck, Flashcard, GenerationRequest, Source, SourceContent};
use crate::error::{Error, Result};
use crate::extract::extract;
use crate::fetch::FetchOptions;
use crate::generate::{generate, CompletionClient};
use crate::parse::parse;
use crate::utils::estimate_tokens;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Where a run currently is. Stages only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    Fetching,
    Extracting,
    Generating,
    Parsing,
    Building,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Generating => "generating",
            Stage::Parsing => "parsing",
            Stage::Building => "building",
            Stage::Done => "done",
        };
        f.write_str(label)
    }
}

/// Receives a notification as each stage starts.
pub trait ProgressSink {
    fn stage(&self, stage: Stage, detail: &str);
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ProgressSink for Silent {
    fn stage(&self, _stage: Stage, _detail: &str) {}
}

/// Retrieval seam so runs can be driven without the network or a man program.
pub trait Fetcher {
    fn fetch(&self, source: &Source) -> Result<SourceContent>;
}

impl Fetcher for FetchOptions {
    fn fetch(&self, source: &Source) -> Result<SourceContent> {
        source.fetch(self)
    }
}

/// Per-run settings, already merged from config and flags.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub num_cards: usize,
    pub model: String,
    pub max_chars: usize,
    pub deck_name: String,
    pub output_dir: PathBuf,
    /// File name (without `.apkg`) when it should differ from the deck name
    pub file_stem: Option<String>,
    /// Prefix manual-page questions with `"<command> - "`
    pub command_prefix: bool,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub deck: Deck,
    pub path: PathBuf,
    /// The source text was cut to fit `max_chars`
    pub truncated: bool,
}

pub struct Pipeline<'a> {
    fetcher: &'a dyn Fetcher,
    client: &'a dyn CompletionClient,
    progress: &'a dyn ProgressSink,
}

impl<'a> Pipeline<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, client: &'a dyn CompletionClient) -> Self {
        Self { fetcher, client, progress: &Silent }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    fn enter(&self, stage: Stage, detail: &str) {
        info!(%stage, detail, "stage");
        self.progress.stage(stage, detail);
    }

    /// Run every stage in order. The deck file is only written once all
    /// earlier stages have succeeded.
    pub fn run(&self, source: &Source, options: &PipelineOptions) -> Result<PipelineOutcome> {
        // Option problems surface before any I/O happens.
        let from_manpage = matches!(source, Source::Manpage(_));
        GenerationRequest::new(String::new(), options.num_cards, &options.model, from_manpage)?;
        if options.deck_name.trim().is_empty() {
            return Err(Error::Config("deck name must not be empty".to_string()));
        }
        if options.max_chars == 0 {
            return Err(Error::Config("max chars must be at least 1".to_string()));
        }
        self.enter(Stage::Idle, "");

        self.enter(Stage::Fetching, source.identifier());
        let content = self.fetcher.fetch(source)?;

        self.enter(Stage::Extracting, source.identifier());
        let extracted = extract(&content, options.max_chars)?;
        debug!(
            chars = extracted.text.chars().count(),
            tokens = estimate_tokens(&extracted.text),
            truncated = extracted.truncated,
            "prepared prompt text"
        );
        if extracted.truncated {
            warn!(max_chars = options.max_chars, "source text truncated to fit the prompt budget");
        }

        self.enter(Stage::Generating, &options.model);
        let request =
            GenerationRequest::new(extracted.text, options.num_cards, &options.model, from_manpage)?;
        let response = generate(self.client, &request)?;

        self.enter(Stage::Parsing, "");
        let mut cards = parse(&response);
        if cards.is_empty() {
            return Err(Error::Api("model response contained no parsable flashcards".to_string()));
        }
        if let (Source::Manpage(command), true) = (source, options.command_prefix) {
            cards = cards.into_iter().map(|card| with_command_prefix(command, card)).collect();
        }

        self.enter(Stage::Building, &options.deck_name);
        let deck = deck::build(&options.deck_name, cards)?;
        let stem = options.file_stem.as_deref().unwrap_or(&deck.name);
        let path = deck::output_path(&options.output_dir, stem);
        deck::serialize(&deck, &path)?;

        self.enter(Stage::Done, &path.display().to_string());
        Ok(PipelineOutcome { deck, path, truncated: extracted.truncated })
    }
}

fn with_command_prefix(command: &str, card: Flashcard) -> Flashcard {
    let prefix = format!("{command} - ");
    if card.question.starts_with(&prefix) {
        return card;
    }
    Flashcard { question: format!("{prefix}{}", card.question), answer: card.answer }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContentKind, GenerationResponse};
    use std::cell::{Cell, RefCell};

    struct FixedPage {
        kind: ContentKind,
        text: &'static str,
    }

    impl Fetcher for FixedPage {
        fn fetch(&self, source: &Source) -> Result<SourceContent> {
            Ok(SourceContent {
                origin: source.clone(),
                kind: self.kind,
                text: self.text.to_string(),
                retrieved_at: chrono::Utc::now(),
            })
        }
    }

    struct Unreachable;

    impl Fetcher for Unreachable {
        fn fetch(&self, source: &Source) -> Result<SourceContent> {
            Err(Error::Network {
                url: source.identifier().to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    struct Canned {
        raw: &'static str,
        calls: Cell<usize>,
        last_prompt: RefCell<String>,
    }

    impl Canned {
        fn new(raw: &'static str) -> Self {
            Self { raw, calls: Cell::new(0), last_prompt: RefCell::new(String::new()) }
        }
    }

    impl CompletionClient for Canned {
        fn complete(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
            self.calls.set(self.calls.get() + 1);
            *self.last_prompt.borrow_mut() = request.text.clone();
            Ok(GenerationResponse {
                raw: self.raw.to_string(),
                requested: request.count,
                model: request.model.clone(),
            })
        }
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Stage>>);

    impl ProgressSink for Recorder {
        fn stage(&self, stage: Stage, _detail: &str) {
            self.0.borrow_mut().push(stage);
        }
    }

    fn options(dir: &std::path::Path, deck_name: &str) -> PipelineOptions {
        PipelineOptions {
            num_cards: 2,
            model: "gpt-3.5-turbo".to_string(),
            max_chars: 4000,
            deck_name: deck_name.to_string(),
            output_dir: dir.to_path_buf(),
            file_stem: None,
            command_prefix: true,
        }
    }

    const PAGE: FixedPage = FixedPage {
        kind: ContentKind::Html,
        text: "<html><body><p>Rust is a systems programming language.</p></body></html>",
    };

    #[test]
    fn writes_deck_and_reports_stages_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = Canned::new("What is Rust?::A systems language||Is Rust fast?::Yes");
        let recorder = Recorder::default();

        let outcome = Pipeline::new(&PAGE, &client)
            .with_progress(&recorder)
            .run(&Source::Url("https://example.com".into()), &options(dir.path(), "Rust"))
            .expect("run");

        assert_eq!(outcome.path, dir.path().join("Rust.apkg"));
        assert_eq!(outcome.deck.len(), 2);
        assert!(!outcome.truncated);
        assert!(client.last_prompt.borrow().contains("systems programming language"));

        let stages = recorder.0.borrow().clone();
        assert_eq!(
            stages,
            vec![
                Stage::Idle,
                Stage::Fetching,
                Stage::Extracting,
                Stage::Generating,
                Stage::Parsing,
                Stage::Building,
                Stage::Done,
            ]
        );
        assert!(stages.windows(2).all(|w| w[0] < w[1]));

        let loaded = deck::read_deck(&outcome.path).expect("read back");
        assert_eq!(loaded.cards[0].card, Flashcard::new("What is Rust?", "A systems language"));
    }

    #[test]
    fn unparsable_response_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = Canned::new("I cannot help with that.");

        let err = Pipeline::new(&PAGE, &client)
            .run(&Source::Url("https://example.com".into()), &options(dir.path(), "Rust"))
            .expect_err("no cards");

        assert!(matches!(err, Error::Api(ref m) if m.contains("no parsable flashcards")));
        assert!(!dir.path().join("Rust.apkg").exists());
    }

    #[test]
    fn fetch_failure_skips_the_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = Canned::new("q::a");

        let err = Pipeline::new(&Unreachable, &client)
            .run(&Source::Url("http://127.0.0.1:1/".into()), &options(dir.path(), "Rust"))
            .expect_err("network");

        assert_eq!(err.kind(), "network");
        assert_eq!(client.calls.get(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).expect("dir").count(), 0);
    }

    #[test]
    fn blank_page_is_empty_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let page = FixedPage { kind: ContentKind::Html, text: "<script>x()</script>   " };
        let client = Canned::new("q::a");

        let err = Pipeline::new(&page, &client)
            .run(&Source::Url("https://example.com".into()), &options(dir.path(), "Rust"))
            .expect_err("empty");

        assert!(matches!(err, Error::EmptyContent(_)));
        assert_eq!(client.calls.get(), 0);
    }

    #[test]
    fn invalid_options_fail_before_fetching() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = Canned::new("q::a");
        let recorder = Recorder::default();
        let mut opts = options(dir.path(), "Rust");
        opts.num_cards = 0;

        let err = Pipeline::new(&Unreachable, &client)
            .with_progress(&recorder)
            .run(&Source::Url("https://example.com".into()), &opts)
            .expect_err("config");

        assert!(matches!(err, Error::Config(_)));
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn file_stem_names_the_file_but_not_the_deck() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = Canned::new("q::a");
        let mut opts = options(dir.path(), "Man Page Flashcards");
        opts.file_stem = Some("tar".to_string());

        let outcome =
            Pipeline::new(&PAGE, &client).run(&Source::Manpage("tar".into()), &opts).expect("run");

        assert_eq!(outcome.path, dir.path().join("tar.apkg"));
        assert_eq!(outcome.deck.name, "Man Page Flashcards");
        assert!(!dir.path().join("Man Page Flashcards.apkg").exists());
    }

    #[test]
    fn manpage_questions_get_command_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let page = FixedPage {
            kind: ContentKind::Manpage,
            text: "TAR(1)     General Commands     TAR(1)\n\nNAME\n     tar - an archiving utility\n",
        };
        let client = Canned::new("What does -x do?::Extracts files||tar - What is -c?::Create");
        let source = Source::Manpage("tar".into());

        let outcome = Pipeline::new(&page, &client)
            .run(&source, &options(dir.path(), "Man Page Flashcards"))
            .expect("run");
        let questions: Vec<&str> =
            outcome.deck.cards.iter().map(|c| c.card.question.as_str()).collect();
        assert_eq!(questions, vec!["tar - What does -x do?", "tar - What is -c?"]);

        let mut opts = options(dir.path(), "Plain");
        opts.command_prefix = false;
        let outcome = Pipeline::new(&page, &client).run(&source, &opts).expect("run");
        assert_eq!(outcome.deck.cards[0].card.question, "What does -x do?");
    }

    #[test]
    fn long_text_is_truncated_before_prompting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let page = FixedPage { kind: ContentKind::PlainText, text: "abcdefghij" };
        let client = Canned::new("q::a");
        let mut opts = options(dir.path(), "Short");
        opts.max_chars = 4;

        let outcome = Pipeline::new(&page, &client)
            .run(&Source::Url("https://example.com/a.txt".into()), &opts)
            .expect("run");

        assert!(outcome.truncated);
        assert_eq!(*client.last_prompt.borrow(), "abcd");
    }
}
