//! Error types and the failure taxonomy shared by every component.

use std::time::Duration;

/// How a failure should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A selector or heuristic found nothing. Logged, never escalated.
    ExpectedMiss,
    /// Network, navigation or remote-service failure. Retried where a
    /// retry budget exists, otherwise aborts the current record only.
    TransientRemote,
    /// Malformed request or configuration. Fails immediately.
    InvalidInput,
    /// No browser or page session could be obtained. Aborts the run.
    FatalEnvironment,
}

/// Errors raised by a [`PageContext`](crate::page::PageContext) implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PageError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("element {selector}: {message}")]
    Element { selector: String, message: String },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser session unavailable: {0}")]
    Session(String),

    #[error("page is closed")]
    Closed,
}

impl PageError {
    /// Classify the error according to the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PageError::Navigation { .. } | PageError::Timeout(_) | PageError::Script(_) => {
                ErrorKind::TransientRemote
            }
            PageError::Element { .. } => ErrorKind::ExpectedMiss,
            PageError::Session(_) | PageError::Closed => ErrorKind::FatalEnvironment,
        }
    }
}

/// Errors returned by the core library.
#[derive(thiserror::Error, Debug)]
pub enum PagewrightError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Page(#[from] PageError),
}

impl PagewrightError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PagewrightError::InvalidInput(_) => ErrorKind::InvalidInput,
            PagewrightError::Page(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PagewrightError>;
