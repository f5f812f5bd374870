//! Unified error types for llmswitch Core.

use llmswitch_types::{ConfigError, ConversionError};
use serde::Serialize;
use thiserror::Error;

/// Main error type for all llmswitch operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Payload conversion failed (malformed wire shape, tool protocol violation).
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for llmswitch operations.
pub type AppResult<T> = Result<T, AppError>;
