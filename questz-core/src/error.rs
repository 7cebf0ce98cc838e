//! Error types for the QUESTZ core library.
//!
//! Only infrastructure failures are errors. Policy rejections, generation
//! failures and validation failures are ordinary return values.

use thiserror::Error;

/// Top-level error type for all QUESTZ operations.
#[derive(Error, Debug)]
pub enum QuestzError {
    /// No quest is registered for the given issuer.
    #[error("Quest not found for issuer: {0}")]
    QuestNotFound(crate::EntityId),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, QuestzError>;
