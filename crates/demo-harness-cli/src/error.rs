//! Error types for the CLI

use demo_harness::{FailureClass, HarnessError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// A run ended without a verdict
    #[error("Run aborted ({}): {source}", .source.class())]
    RunAborted {
        /// Fatal harness error
        source: HarnessError,
        /// Where diagnostics were written, if anywhere
        artifacts: Option<PathBuf>,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Harness library error
    #[error("{0}")]
    Harness(#[from] HarnessError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Failure class of the underlying harness error, if any
    #[must_use]
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            Self::RunAborted { source, .. } | Self::Harness(source) => Some(source.class()),
            _ => None,
        }
    }
}
