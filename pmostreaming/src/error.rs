//! Error types for pmostreaming

use std::sync::Arc;

/// Result type alias for streaming operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the network session.
///
/// Cloneable: the same completion is delivered to the stream and, through
/// the source, to its delegate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    /// Transport failure (connection, TLS, body read...)
    #[error("network failure: {0}")]
    Failure(#[source] Arc<reqwest::Error>),

    /// The server answered with a non-success status
    #[error("server error: HTTP {status}")]
    ServerError { status: u16 },

    /// The stream was cancelled before or during its transfer
    #[error("stream cancelled")]
    Cancelled,

    /// The session no longer accepts new tasks
    #[error("session invalidated")]
    Invalidated,
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        NetworkError::Failure(Arc::new(err))
    }
}

/// Errors that can occur while delivering audio data
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Network session error
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// IO error (local file sources)
    #[error("IO error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error (from pmoconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True when the error only reflects a cancellation requested locally
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Network(NetworkError::Cancelled))
    }
}
