use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error vocabulary every public operation of the crate speaks,
/// regardless of which backend is driving the document.
#[derive(Error, Debug)]
pub enum PincerError {
    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Stale element: {0}")]
    StaleElement(String),

    #[error("Condition '{condition}' not met after {elapsed:?}")]
    ConditionTimeout { condition: String, elapsed: Duration },

    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Backend error: {0}")]
    Backend(#[source] BoxError),
}

pub type Result<T> = std::result::Result<T, PincerError>;

/// How a backend classifies one of its own failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Stale,
    NoSuchElement,
    Unsupported,
    InvalidTarget,
    Other,
}

/// Implemented by every backend error type. Backends report failures in
/// their own terms; the core maps them onto [`PincerError`].
pub trait BackendFailure: std::error::Error + Send + Sync + 'static {
    fn kind(&self) -> FailureKind {
        FailureKind::Other
    }
}

impl PincerError {
    pub fn from_backend<E: BackendFailure>(err: E) -> Self {
        let kind = err.kind();
        tracing::debug!(?kind, error = %err, "normalizing backend failure");
        match kind {
            FailureKind::Stale => PincerError::StaleElement(err.to_string()),
            FailureKind::NoSuchElement => PincerError::NoSuchElement(err.to_string()),
            FailureKind::Unsupported => PincerError::UnsupportedCapability(err.to_string()),
            FailureKind::InvalidTarget => PincerError::InvalidTarget(err.to_string()),
            FailureKind::Other => PincerError::Backend(Box::new(err)),
        }
    }

    pub fn unsupported(capability: &str) -> Self {
        PincerError::UnsupportedCapability(format!("backend does not support {capability}"))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, PincerError::StaleElement(_))
    }
}

impl From<reqwest::Error> for PincerError {
    fn from(err: reqwest::Error) -> Self {
        PincerError::Backend(Box::new(err))
    }
}

/// Translation boundary applied to every backend call made by the core.
pub(crate) trait Normalize<T> {
    fn normalized(self) -> Result<T>;
}

impl<T, E: BackendFailure> Normalize<T> for std::result::Result<T, E> {
    fn normalized(self) -> Result<T> {
        self.map_err(PincerError::from_backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Error, Debug)]
    enum FakeError {
        #[error("node went away")]
        Gone,
        #[error("socket closed")]
        Socket,
    }

    impl BackendFailure for FakeError {
        fn kind(&self) -> FailureKind {
            match self {
                FakeError::Gone => FailureKind::Stale,
                FakeError::Socket => FailureKind::Other,
            }
        }
    }

    #[test]
    fn classified_failures_map_to_their_kind() {
        let err: Result<()> = Err(FakeError::Gone).normalized();
        assert!(matches!(err, Err(PincerError::StaleElement(msg)) if msg == "node went away"));
    }

    #[test]
    fn unclassified_failures_are_wrapped_with_their_message() {
        let err = PincerError::from_backend(FakeError::Socket);
        assert!(matches!(err, PincerError::Backend(_)));
        assert_eq!(err.to_string(), "Backend error: socket closed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
