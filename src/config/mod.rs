//! Configuration loading
//!
//! Layers, lowest to highest precedence: built-in defaults, a config file
//! (`ai-flashcards.toml` or `.ai-flashcards.yml`), `AI_FLASHCARDS_*`
//! environment variables, then CLI flags (see [`merge_cli_with_config`]).

mod merge;

pub use merge::{merge_cli_with_config, CliOverrides};

use crate::domain::Config;
use crate::error::{Error, Result};
use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use figment::Figment;
use std::path::Path;
use tracing::debug;

/// Config file names looked up in the working directory, in merge order.
pub const CONFIG_FILE_NAMES: &[&str] = &["ai-flashcards.toml", ".ai-flashcards.yml"];

/// Prefix for environment overrides, e.g. `AI_FLASHCARDS_MODEL=gpt-4o`.
pub const ENV_PREFIX: &str = "AI_FLASHCARDS_";

/// Load configuration anchored at `dir`, or from `explicit` when given.
pub fn load_config(dir: &Path, explicit: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(Error::Config(format!("config file not found: {}", path.display())));
            }
            debug!(path = %path.display(), "loading config file");
            figment = if is_yaml(path) {
                figment.merge(Yaml::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }
        None => {
            for name in CONFIG_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    debug!(path = %candidate.display(), "loading config file");
                    figment = if is_yaml(&candidate) {
                        figment.merge(Yaml::file(candidate))
                    } else {
                        figment.merge(Toml::file(candidate))
                    };
                }
            }
        }
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX))
        .extract::<Config>()
        .map_err(|e| Error::Config(e.to_string()))
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yml" | "yaml"))
}
