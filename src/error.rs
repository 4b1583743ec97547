//! Error kinds of the harness and how the scenario runner reacts to them.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while resolving, measuring or recording a scenario.
#[derive(Debug, Error)]
pub enum Error {
    /// Harness misuse (e.g. a zero unit count handed to the timer). Fatal.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A backend cannot realize the requested tier. The scenario is skipped.
    #[error("{backend}: unsupported parameter: {reason}")]
    UnsupportedParameter { backend: String, reason: String },

    /// A native call failed unexpectedly. The scenario is marked failed.
    #[error("{backend}: operation failed: {reason}")]
    BackendOperationFailure { backend: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// What the runner does with an error raised inside one scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Skip,
    Fail,
    Abort,
}

impl Error {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidArgument(reason.into())
    }

    pub fn unsupported(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnsupportedParameter {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn backend(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::BackendOperationFailure {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Errors never cross scenario boundaries, except the ones that signal a bug
    /// in the harness itself or a broken result sink.
    pub fn disposition(&self) -> Disposition {
        match self {
            Error::UnsupportedParameter { .. } => Disposition::Skip,
            Error::BackendOperationFailure { .. } => Disposition::Fail,
            Error::InvalidArgument(_) | Error::Config(_) | Error::Io(_) | Error::Csv(_) => {
                Disposition::Abort
            }
        }
    }
}
