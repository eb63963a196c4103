//! Live-browser backend driven over the Chrome DevTools protocol.

pub mod chrome;
pub mod scripts;

pub use chrome::{ChromeBackend, ChromeNode};
pub use scripts::NodeRef;

use crate::errors::{BackendFailure, FailureKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChromeError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Chrome error: {0}")]
    Protocol(String),

    #[error("Browser session is closed")]
    Closed,

    #[error("No such window: {0}")]
    NoSuchWindow(String),

    #[error("Element is stale: {0}")]
    Stale(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Form error: {0}")]
    Form(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScript(String),

    #[error("Malformed script result: {0}")]
    MalformedResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendFailure for ChromeError {
    fn kind(&self) -> FailureKind {
        match self {
            ChromeError::Stale(_) => FailureKind::Stale,
            ChromeError::InvalidSelector(_)
            | ChromeError::Frame(_)
            | ChromeError::Form(_)
            | ChromeError::NoSuchWindow(_) => FailureKind::InvalidTarget,
            _ => FailureKind::Other,
        }
    }
}

/// Maps a headless_chrome failure into [`ChromeError::Protocol`].
pub(crate) fn protocol<E: std::fmt::Display>(err: E) -> ChromeError {
    ChromeError::Protocol(err.to_string())
}
