//! `inspect-deck` command implementation

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::generate::print_cards;
use crate::deck::read_deck;

#[derive(Args)]
pub struct InspectArgs {
    /// Path to an .apkg file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print the deck as JSON instead of a card listing
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let deck = read_deck(&args.file)
        .with_context(|| format!("Failed to read deck from {}", args.file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&deck)?);
        return Ok(());
    }

    print_cards(&deck);
    println!("  cards: {}", deck.len());
    Ok(())
}
