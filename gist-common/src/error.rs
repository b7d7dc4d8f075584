//! Tagged error type shared by every stage of the pipeline.
//!
//! Retry decisions never inspect error messages or downcast: each
//! [`GistError`] carries an explicit `retryable` flag that the backoff
//! executor matches on.

use serde::{Deserialize, Serialize};

/// Failure classes understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed caller input (bad URL, out-of-range option).
    InvalidInput,
    /// Timeouts, 429, 5xx, missing responses, network failures.
    Transient,
    /// The model answered with nothing but whitespace.
    EmptySummary,
    /// 4xx other than 429, malformed content.
    Permanent,
    /// The page did not yield enough readable text.
    NoContent,
    /// Every attempt of a retried operation failed.
    ExhaustedRetries,
    /// Missing or inconsistent configuration.
    Config,
}

impl ErrorKind {
    /// Whether errors of this kind are retryable unless overridden.
    pub fn default_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::EmptySummary)
    }
}

/// Error used across the gist workspace.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GistError {
    kind: ErrorKind,
    message: String,
    retryable: bool,
}

/// Convenient alias for results that use [`GistError`].
pub type Result<T> = std::result::Result<T, GistError>;

impl GistError {
    /// Build an error whose `retryable` flag follows [`ErrorKind::default_retryable`].
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.default_retryable(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn no_content(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoContent, message)
    }

    pub fn empty_summary() -> Self {
        Self::new(
            ErrorKind::EmptySummary,
            "EMPTY_SUMMARY: language model returned an empty response",
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Terminal error raised once a retried operation runs out of attempts.
    ///
    /// ```
    /// use gist_common::{ErrorKind, GistError};
    ///
    /// let last = GistError::transient("HTTP 503 Service Unavailable");
    /// let err = GistError::exhausted("navigate", 4, &last);
    /// assert_eq!(err.kind(), ErrorKind::ExhaustedRetries);
    /// assert!(!err.is_retryable());
    /// assert!(err.message().contains("4 attempts"));
    /// assert!(err.message().contains("HTTP 503"));
    /// ```
    pub fn exhausted(label: &str, attempts: u32, last: &GistError) -> Self {
        Self::new(
            ErrorKind::ExhaustedRetries,
            format!("{label} failed after {attempts} attempts: {}", last.message),
        )
    }

    /// Override the default retry classification.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<anyhow::Error> for GistError {
    /// Untyped driver/transport failures are treated as transient.
    fn from(err: anyhow::Error) -> Self {
        Self::transient(format!("{err:#}"))
    }
}
