//! Error taxonomy for the orchestration core.
//!
//! None of these ever end a round: the session turns each one into a
//! recorded outcome or a substituted reply and moves on.

use std::time::Duration;

/// Errors raised at the project file store boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("path escapes the project root: {0}")]
    PathTraversal(String),
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// Errors from external collaborators: model service, image service,
/// external processes.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed backend response: {0}")]
    Malformed(String),
    #[error("refused: {0}")]
    Refused(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Malformed(e.to_string())
        } else {
            BackendError::Unavailable(e.to_string())
        }
    }
}
