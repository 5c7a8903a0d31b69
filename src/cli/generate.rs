//! `generate-from-url` and `generate-from-manpage` command implementation

use anyhow::{Context, Result};
use clap::Args;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

use crate::config::{load_config, merge_cli_with_config, CliOverrides};
use crate::domain::{Deck, Source, DEFAULT_MANPAGE_DECK_NAME, DEFAULT_URL_DECK_NAME};
use crate::fetch::FetchOptions;
use crate::generate::{ApiKey, OpenAiClient};
use crate::pipeline::{Pipeline, PipelineOptions, ProgressSink, Stage};

/// Flags shared by both generate commands.
#[derive(Args)]
pub struct GenerateOptions {
    /// Number of flashcards to generate [default: 5]
    #[arg(short = 'n', long, value_name = "N", value_parser = parse_card_count)]
    pub num_cards: Option<usize>,

    /// Name of the Anki deck, also used for the .apkg file name
    /// (default man-page decks are written to <COMMAND>.apkg)
    #[arg(short = 'd', long, value_name = "NAME")]
    pub deck_name: Option<String>,

    /// Chat model to use [default: gpt-3.5-turbo]
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Directory to write the .apkg file to [default: .]
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum characters of source text sent to the model [default: 4000]
    #[arg(long, value_name = "CHARS")]
    pub max_chars: Option<usize>,

    /// Path to config file (ai-flashcards.toml or .ai-flashcards.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Do not print the generated cards
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct UrlArgs {
    /// Web page to generate flashcards from
    #[arg(value_name = "URL")]
    pub url: String,

    #[command(flatten)]
    pub options: GenerateOptions,
}

#[derive(Args)]
pub struct ManpageArgs {
    /// Command whose manual page is used
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Keep questions as the model wrote them, without the "<command> - " prefix
    #[arg(long)]
    pub no_command_prefix: bool,

    #[command(flatten)]
    pub options: GenerateOptions,
}

pub fn run_url(args: UrlArgs) -> Result<()> {
    run(Source::Url(args.url), args.options, DEFAULT_URL_DECK_NAME, false)
}

pub fn run_manpage(args: ManpageArgs) -> Result<()> {
    let prefix = !args.no_command_prefix;
    run(Source::Manpage(args.command), args.options, DEFAULT_MANPAGE_DECK_NAME, prefix)
}

fn run(
    source: Source,
    args: GenerateOptions,
    default_deck_name: &str,
    command_prefix: bool,
) -> Result<()> {
    // Credential first: nothing is fetched without a key.
    let api_key = ApiKey::from_env()?;

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let file_config = load_config(&cwd, args.config.as_deref())?;
    let config = merge_cli_with_config(
        file_config,
        CliOverrides {
            model: args.model,
            num_cards: args.num_cards,
            max_chars: args.max_chars,
            output_dir: args.output_dir,
        },
    );

    let fetcher = FetchOptions::from_config(&config);
    let client = OpenAiClient::from_config(&config, api_key)?;
    // Default man-page decks share one name but get one file per command.
    let file_stem = match (&source, &args.deck_name) {
        (Source::Manpage(command), None) => Some(command.clone()),
        _ => None,
    };
    let options = PipelineOptions {
        num_cards: config.num_cards,
        model: config.model.clone(),
        max_chars: config.max_chars,
        deck_name: args.deck_name.unwrap_or_else(|| default_deck_name.to_string()),
        output_dir: config.output_dir.clone(),
        file_stem,
        command_prefix,
    };

    let spinner = Spinner::new();
    let outcome = Pipeline::new(&fetcher, &client)
        .with_progress(&spinner)
        .run(&source, &options);
    spinner.clear();
    let outcome = outcome.with_context(|| format!("Failed to generate flashcards from {source}"))?;

    if outcome.truncated {
        eprintln!(
            "{} source text was truncated to {} characters",
            style("Warning:").yellow().bold(),
            config.max_chars
        );
    }
    if !args.quiet {
        print_cards(&outcome.deck);
    }

    println!("{} {}", style("Deck written to").green().bold(), outcome.path.display());
    println!("  deck:  {}", outcome.deck.name);
    println!("  cards: {}", outcome.deck.len());
    Ok(())
}

fn parse_card_count(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Stage spinner on stderr. Hidden when stderr is not a terminal.
struct Spinner(ProgressBar);

impl Spinner {
    fn new() -> Self {
        if !Term::stderr().is_term() {
            return Self(ProgressBar::hidden());
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(template);
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        Self(bar)
    }

    fn clear(&self) {
        self.0.finish_and_clear();
    }
}

impl ProgressSink for Spinner {
    fn stage(&self, stage: Stage, detail: &str) {
        let message = match stage {
            Stage::Idle | Stage::Done => return,
            Stage::Fetching => format!("Fetching {detail}"),
            Stage::Extracting => "Extracting text".to_string(),
            Stage::Generating => format!("Generating flashcards with {detail}"),
            Stage::Parsing => "Parsing response".to_string(),
            Stage::Building => format!("Writing deck '{detail}'"),
        };
        self.0.set_message(message);
    }
}

const MAX_PANEL_WIDTH: usize = 78;

/// Print each card as a numbered question with its answer underneath.
pub(crate) fn print_cards(deck: &Deck) {
    let term_width = Term::stdout().size_checked().map(|(_, cols)| cols as usize);
    let width = deck
        .cards
        .iter()
        .flat_map(|c| [c.card.question.width(), c.card.answer.width()])
        .max()
        .unwrap_or(0)
        .saturating_add(4)
        .min(term_width.unwrap_or(MAX_PANEL_WIDTH).min(MAX_PANEL_WIDTH))
        .max(10);
    let rule = "─".repeat(width);

    println!();
    println!("{}", style(&deck.name).bold());
    println!("{rule}");
    for entry in &deck.cards {
        println!("{} {}", style(format!("{:>2}.", entry.id)).dim(), style(&entry.card.question).cyan());
        println!("    {}", entry.card.answer);
        println!("{rule}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::parse_card_count;

    #[test]
    fn card_count_must_be_positive() {
        assert_eq!(parse_card_count("7"), Ok(7));
        assert!(parse_card_count("0").is_err());
        assert!(parse_card_count("-1").is_err());
        assert!(parse_card_count("many").is_err());
    }
}
