//! Error types for crew-core

use thiserror::Error;

/// Result type alias for crew-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for tool and agent operations
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// Agent or executor could not be set up
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Agent or tool processing failed
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    /// Tool received parameters that do not match its schema
    #[error("Invalid tool input: {0}")]
    InvalidInput(String),
}
