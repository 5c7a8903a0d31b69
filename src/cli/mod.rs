//! Command-line interface for ai-flashcards
//!
//! Provides `generate-from-url`, `generate-from-manpage`, `inspect-deck` and
//! `completions` subcommands.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod generate;
mod inspect;

/// Generate Anki flashcard decks from web pages and man pages with an LLM
#[derive(Parser)]
#[command(name = "ai-flashcards")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a deck from the text of a web page
    GenerateFromUrl(generate::UrlArgs),

    /// Generate a deck from a command's manual page
    GenerateFromManpage(generate::ManpageArgs),

    /// Print the name and cards of an existing .apkg file
    InspectDeck(inspect::InspectArgs),

    /// Print a shell completion script
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Wire verbose flag to the tracing log level.
    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::GenerateFromUrl(args) => generate::run_url(args),
        Commands::GenerateFromManpage(args) => generate::run_manpage(args),
        Commands::InspectDeck(args) => inspect::run(args),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
