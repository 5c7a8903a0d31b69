//! Manual page fetcher.

use super::FetchOptions;
use crate::domain::{ContentKind, Source, SourceContent};
use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::process::{Command, Stdio};
use tracing::debug;

/// man-db's exit status for "no manual entry".
const MAN_EXIT_NOT_FOUND: i32 = 16;

/// Render the manual page of `command` with the configured man program.
pub fn fetch_manpage(command: &str, options: &FetchOptions) -> Result<SourceContent> {
    validate_command_name(command)?;

    let program = options.man_program.as_str();
    debug!(program, command, "rendering manual page");
    let output = Command::new(program)
        .arg("--")
        .arg(command)
        .env("MANPAGER", "cat")
        .env("PAGER", "cat")
        .env("MANWIDTH", "80")
        .env_remove("MAN_KEEP_FORMATTING")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::Execution {
            program: program.to_string(),
            message: if e.kind() == ErrorKind::NotFound {
                "program not found in PATH".to_string()
            } else {
                e.to_string()
            },
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = classify_output(command, program, output.status.code(), stdout, &stderr)?;

    Ok(SourceContent {
        origin: Source::Manpage(command.to_string()),
        kind: ContentKind::Manpage,
        text,
        retrieved_at: chrono::Utc::now(),
    })
}

/// Reject names that cannot be a command and would otherwise be read as man options or paths.
pub fn validate_command_name(command: &str) -> Result<()> {
    let invalid = command.is_empty()
        || command.starts_with('-')
        || command.chars().any(|c| c.is_whitespace() || c.is_control() || c == '/' || c == '\\');
    if invalid {
        return Err(Error::NotFound(command.to_string()));
    }
    Ok(())
}

fn classify_output(
    command: &str,
    program: &str,
    code: Option<i32>,
    stdout: String,
    stderr: &str,
) -> Result<String> {
    match code {
        Some(0) if stdout.trim().is_empty() => Err(Error::NotFound(command.to_string())),
        Some(0) => Ok(stdout),
        Some(MAN_EXIT_NOT_FOUND) => Err(Error::NotFound(command.to_string())),
        _ if stderr.to_ascii_lowercase().contains("no manual entry") => {
            Err(Error::NotFound(command.to_string()))
        }
        Some(code) => Err(Error::Execution {
            program: program.to_string(),
            message: format!("exited with status {code}: {}", stderr.trim()),
        }),
        None => Err(Error::Execution {
            program: program.to_string(),
            message: "terminated by a signal".to_string(),
        }),
    }
}
