//! Static backend: documents fetched over HTTP and parsed in memory.

pub mod backend;
pub mod document;

pub use backend::{FetchBackend, FetchNode};
pub use document::{FormSubmission, StaticPage};

use crate::errors::{BackendFailure, FailureKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document session is closed")]
    Closed,

    #[error("No document is loaded")]
    NoDocument,

    #[error("Element is stale: {0}")]
    Stale(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("No such window: {0}")]
    NoSuchWindow(String),

    #[error("Static documents do not support {0}")]
    Unsupported(&'static str),
}

impl BackendFailure for FetchError {
    fn kind(&self) -> FailureKind {
        match self {
            FetchError::Stale(_) => FailureKind::Stale,
            FetchError::InvalidSelector(_)
            | FetchError::InvalidTarget(_)
            | FetchError::NoSuchWindow(_) => FailureKind::InvalidTarget,
            FetchError::Unsupported(_) => FailureKind::Unsupported,
            _ => FailureKind::Other,
        }
    }
}
