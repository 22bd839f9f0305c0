//! Transport error types.

use thiserror::Error;

/// Errors raised while setting up or running the HTTP endpoints.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The route prefix is empty once slashes are trimmed.
    #[error("Invalid route prefix: `{0}`")]
    InvalidPrefix(String),

    /// The configured secret header is not a valid HTTP header name.
    #[error("Invalid secret header name: `{0}`")]
    InvalidHeaderName(String),

    /// Binding or serving failed.
    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
