use thiserror::Error;

/// Failures talking to the hosted backend. All of them are transient from
/// the core's point of view: callers log them and move on.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend is not configured: {0}")]
    NotConfigured(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = Result<T, BackendError>;
