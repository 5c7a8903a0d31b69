//! Error taxonomy shared by every pipeline stage.

use std::path::PathBuf;

/// Failure of one pipeline stage. Every variant aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection failure, non-2xx status, timeout or unusable URL while fetching a page.
    #[error("failed to fetch {url}: {message}")]
    Network { url: String, message: String },

    /// The requested manual page does not exist.
    #[error("no manual entry for '{0}'")]
    NotFound(String),

    /// The man program could not be started or exited unsuccessfully.
    #[error("`{program}` failed: {message}")]
    Execution { program: String, message: String },

    /// Nothing but whitespace was left after cleaning the fetched content.
    #[error("no usable text in {0} after cleaning")]
    EmptyContent(String),

    /// Authentication, quota, transport or envelope problem with the model API.
    #[error("model API error: {0}")]
    Api(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing credential or invalid option value.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// Wrap a non-io failure (zip, sqlite) that happened while handling `path`.
    pub(crate) fn io_other(
        path: impl Into<PathBuf>,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Io { path: path.into(), source: std::io::Error::other(err) }
    }

    /// Short, stable label used in progress output and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Network { .. } => "network",
            Error::NotFound(_) => "not-found",
            Error::Execution { .. } => "execution",
            Error::EmptyContent(_) => "empty-content",
            Error::Api(_) => "api",
            Error::Io { .. } => "io",
            Error::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn messages_name_the_failing_input() {
        let err = Error::Network {
            url: "http://127.0.0.1:1/".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "failed to fetch http://127.0.0.1:1/: connection refused");
        assert_eq!(err.kind(), "network");

        let err = Error::NotFound("nosuchcmd".to_string());
        assert_eq!(err.to_string(), "no manual entry for 'nosuchcmd'");
    }

    #[test]
    fn io_error_keeps_source() {
        let err = Error::io(
            "/nope/deck.apkg",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/nope/deck.apkg"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
