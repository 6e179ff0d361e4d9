use std::error::Error;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Error kind that represents failures reported by the [`crate::FlagEvaluator`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The evaluation was cancelled through its cancellation token.
    Cancelled = 1000,
    /// A cache or repository operation did not finish within the configured timeout.
    TimedOut = 1001,
    /// A scheduled flag was evaluated without an enable date.
    ScheduleNotConfigured = 2000,
    /// A rollout evaluator was invoked without the identifier it works on.
    MissingIdentifier = 2001,
    /// None of the registered evaluators could process the flag.
    NoEvaluator = 2002,
    /// The flag repository failed to load a flag.
    RepositoryFailure = 3000,
    /// The flag cache failed to read or write a flag.
    CacheFailure = 3001,
    /// The options given to the [`crate::FlagEvaluatorBuilder`] are invalid.
    InvalidOptions = 4000,
}

impl ErrorKind {
    pub(crate) fn as_code(&self) -> u16 {
        *self as u16
    }
}

/// Error struct that holds the [`ErrorKind`] and message of the reported failure.
#[derive(Debug, PartialEq)]
pub struct FlagError {
    /// Error kind that represents failures reported by the [`crate::FlagEvaluator`].
    pub kind: ErrorKind,
    /// The text representation of the failure.
    pub message: String,
}

impl FlagError {
    pub(crate) fn new(kind: ErrorKind, message: String) -> Self {
        Self { message, kind }
    }

    pub(crate) fn cancelled(operation: &str) -> Self {
        Self::new(
            ErrorKind::Cancelled,
            format!("Operation '{operation}' was cancelled."),
        )
    }

    /// Returns `true` when the failure was caused by cancellation or a timeout.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled | ErrorKind::TimedOut)
    }
}

impl Display for FlagError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message.as_str())
    }
}

impl Error for FlagError {}

/// Error returned by [`crate::FlagRepository`] and [`crate::FlagCache`] implementations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The operation observed its cancellation token and stopped.
    #[error("operation was cancelled")]
    Cancelled,
    /// A flag with the same key is already stored.
    #[error("flag '{0}' already exists")]
    AlreadyExists(String),
    /// Any other failure of the underlying store.
    #[error("{0}")]
    Backend(String),
}
