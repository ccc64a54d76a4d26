//! Engine error types
//!
//! The engine itself never fails a pass: these errors are produced by a single
//! rule and are logged and dropped by the rule engine, so one broken rule
//! cannot hide the warnings of the others.

use thiserror::Error;

/// Failure of one rule on one node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Unexpected shape at '{path}': expected {expected}")]
    UnexpectedShape { path: String, expected: &'static str },

    #[error("Rule panicked: {message}")]
    Panicked { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl RuleError {
    pub fn unexpected_shape(path: impl Into<String>, expected: &'static str) -> Self {
        Self::UnexpectedShape {
            path: path.into(),
            expected,
        }
    }
}

pub type RuleResult<T> = std::result::Result<T, RuleError>;
