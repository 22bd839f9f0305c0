//! Runtime error types.

use thiserror::Error;

use hasura_hooks_core::ConfigurationError;
use hasura_hooks_transport::TransportError;

use crate::config::ConfigError;

/// Errors that stop the runtime from starting or serving.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or validating the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The discovered handlers do not form a valid handler table.
    #[error("Invalid handler registration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Building or running the HTTP transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
