//! CLI error types with exit code handling
//!
//! Commands return `miette::Result`; errors that should end the process with
//! a specific exit code are raised as [`CliError`] and recognized in `main`.

use kanvas_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Graph snapshot could not be loaded
    #[error("Snapshot error: {message}")]
    #[diagnostic(code(kanvas::cli::snapshot))]
    Snapshot {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Project configuration or schema catalog could not be loaded
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kanvas::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Invalid command-line input
    #[error("{message}")]
    #[diagnostic(code(kanvas::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Lint reported blocking warnings
    #[error("Lint failed with {danger} danger warning(s) out of {total}")]
    #[diagnostic(code(kanvas::cli::lint))]
    LintFailed { danger: usize, total: usize },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(kanvas::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Snapshot { .. } => exit_codes::SNAPSHOT_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::LintFailed { .. } => exit_codes::LINT_FAILED,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }

    pub fn snapshot(message: impl Into<String>, help: Option<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
            help,
        }
    }

    pub fn config(message: impl Into<String>, help: Option<String>) -> Self {
        Self::Config {
            message: message.into(),
            help,
        }
    }

    pub fn usage(message: impl Into<String>, help: Option<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help,
        }
    }

    pub fn lint_failed(danger: usize, total: usize) -> Self {
        Self::LintFailed { danger, total }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            err @ (CoreError::SnapshotNotFound { .. } | CoreError::InvalidSnapshot { .. }) => {
                CliError::snapshot(err.to_string(), None)
            }
            other => CliError::config(other.to_string(), None),
        }
    }
}
