//! Error types shared across Kyma crates

use std::path::PathBuf;
use thiserror::Error;

/// Required input is missing or malformed
///
/// All violations are collected before the error is returned, so a single
/// message lists every missing flag rather than only the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// One or more required flags were not set
    #[error("{}", missing_flags_message(.0))]
    MissingFlags(Vec<&'static str>),

    /// An extra configuration was not a NAME=VALUE pair
    #[error("Wrong format for extra configuration {0}. Please provide NAME=VALUE pairs.")]
    MalformedExtra(String),
}

fn missing_flags_message(flags: &[&'static str]) -> String {
    flags
        .iter()
        .map(|flag| format!("\nRequired flag `{}` has not been set.", flag))
        .collect()
}

/// An external collaborator (provider CLI, kubectl, file system) failed
#[derive(Debug, Error)]
pub enum ExternalError {
    /// The program ran but exited unsuccessfully
    #[error("`{program}` exited with code {code}: {stderr}")]
    Command {
        program: String,
        code: i32,
        stderr: String,
    },

    /// The program could not be started
    #[error("failed to execute `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing a file failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The collaborator returned data that could not be understood
    #[error("unexpected response: {0}")]
    Parse(String),

    /// The collaborator reported that the operation failed
    #[error("{0}")]
    Reported(String),

    /// The operation did not finish in time
    #[error("timed out after {}s waiting for {operation}", .after.as_secs())]
    Timeout {
        operation: String,
        after: std::time::Duration,
    },

    /// The operation is not available on this platform
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ExternalError {
    /// Create an I/O error for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a step pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Inputs were rejected before any step started
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A step body returned an error
    #[error("{step}: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A step was requested after an earlier step failed
    #[error("pipeline aborted, step `{step}` was not started")]
    Aborted { step: String },
}

impl PipelineError {
    /// Description of the step the error belongs to, if any
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Validation(_) => None,
            Self::StepFailed { step, .. } | Self::Aborted { step } => Some(step),
        }
    }

    /// Check if this error was caused by invalid input
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
