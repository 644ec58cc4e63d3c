//! Error types surfaced by the shell.
//!
//! There are two tiers. [`ShellError`] covers everything the shell itself
//! detects (quoting, pipe grammar, redirection, dispatch) and always renders
//! as a single `shell: <message>` line. [`AppError`] wraps a failure reported
//! by a builtin application and renders with that application's prefix.

use crate::redirect::RedirectKind;
use thiserror::Error;

/// Status handed to the host process when `exit` runs.
pub type ExitCode = i32;

/// Failure of a single builtin application, e.g. `sed: char 0: no previous regular expression`.
#[derive(Debug, Error)]
#[error("{app}: {message}")]
pub struct AppError {
    /// Canonical name of the application that failed.
    pub app: &'static str,
    /// Application specific message, without the prefix.
    pub message: String,
}

impl AppError {
    pub fn new(app: &'static str, message: impl Into<String>) -> Self {
        Self {
            app,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShellError {
    /// A `'`, `"` or `` ` `` was opened but never closed.
    #[error("shell: unterminated quote {quote} at position {position}")]
    UnterminatedQuote { quote: char, position: usize },

    #[error("shell: {0}: Invalid app")]
    InvalidApp(String),

    #[error("shell: Invalid pipe operator/s")]
    InvalidPipe,

    #[error("shell: no {} file specified", .0.noun())]
    MissingRedirectTarget(RedirectKind),

    #[error("shell: only 1 {}stream can be specified", .0.noun())]
    DuplicateRedirect(RedirectKind),

    /// A redirection target contains a backquoted command.
    #[error("shell: {} file name cannot use command substitution", .0.noun())]
    SubstitutedRedirectTarget(RedirectKind),

    /// A redirection target could not be opened.
    #[error("shell: {file}: {reason}")]
    RedirectOpen { file: String, reason: String },

    #[error("shell: {0}")]
    Io(#[from] std::io::Error),

    #[error("shell: pipeline stage {0} panicked")]
    StagePanicked(usize),

    #[error(transparent)]
    App(#[from] AppError),

    /// Not a failure: `exit` ran and the host should stop with this status.
    #[error("exit {0}")]
    Exit(ExitCode),
}

impl ShellError {
    /// Whether this value is the `exit` control transfer rather than an error.
    pub fn is_exit(&self) -> bool {
        matches!(self, ShellError::Exit(_))
    }
}

/// Describe an I/O error the way coreutils prints it, without the
/// `(os error N)` suffix `std` appends.
pub(crate) fn describe_io(err: &std::io::Error) -> String {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::NotFound => "No such file or directory".to_string(),
        ErrorKind::PermissionDenied => "Permission denied".to_string(),
        ErrorKind::AlreadyExists => "File exists".to_string(),
        ErrorKind::IsADirectory => "Is a directory".to_string(),
        ErrorKind::NotADirectory => "Not a directory".to_string(),
        _ => {
            let text = err.to_string();
            match text.find(" (os error") {
                Some(idx) => text[..idx].to_string(),
                None => text,
            }
        }
    }
}
