//! Content fetching: web pages over HTTP and manual pages via the local man program.

mod manpage;
mod url;

pub use manpage::{fetch_manpage, validate_command_name};
pub use url::{decode_body, fetch_url};

use crate::domain::{Config, Source, SourceContent};
use crate::error::Result;
use std::time::Duration;

/// Settings shared by both fetchers.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub man_program: String,
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.fetch_timeout_secs.max(1)),
            user_agent: config.user_agent.clone(),
            man_program: config.man_program.clone(),
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Source {
    /// Retrieve the raw content behind this source.
    pub fn fetch(&self, options: &FetchOptions) -> Result<SourceContent> {
        fetch(self, options)
    }
}

/// Retrieve the raw content behind `source`.
///
/// Performs exactly one network request or one subprocess call.
pub fn fetch(source: &Source, options: &FetchOptions) -> Result<SourceContent> {
    match source {
        Source::Url(url) => fetch_url(url, options),
        Source::Manpage(command) => fetch_manpage(command, options),
    }
}
