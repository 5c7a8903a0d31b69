//! CLI argument merging with config

use crate::domain::Config;
use std::path::PathBuf;

#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub num_cards: Option<usize>,
    pub max_chars: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

pub fn merge_cli_with_config(mut base_config: Config, cli: CliOverrides) -> Config {
    if let Some(model) = cli.model {
        base_config.model = model;
    }
    if let Some(num_cards) = cli.num_cards {
        base_config.num_cards = num_cards;
    }
    if let Some(max_chars) = cli.max_chars {
        base_config.max_chars = max_chars;
    }
    if let Some(output_dir) = cli.output_dir {
        base_config.output_dir = output_dir;
    }

    base_config
}
