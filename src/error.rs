//! Custom error types for dirfts
//!
//! Uses thiserror for ergonomic error definitions with automatic
//! Display and Error trait implementations.

use thiserror::Error;

/// Application-specific errors for dirfts
#[derive(Error, Debug)]
pub enum DirftsError {
    /// No index store in the starting directory or any ancestor
    #[error("No index found. Run `dirfts init` first.")]
    NotFound,

    /// An index store already exists where one was to be created
    #[error("Index already exists at {0}")]
    AlreadyExists(String),

    /// Malformed exclusion rule
    #[error("Invalid exclusion rule: {0}")]
    InvalidRule(String),

    /// No exclusion rule has the given id
    #[error("No exclusion rule with id {0}")]
    RuleNotFound(i64),

    /// Invalid file or directory path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Malformed search pattern
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Search mode not available for this store
    #[error("Unsupported search mode: {0}")]
    UnsupportedMode(String),

    /// Unknown config key or malformed config value
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// IO operations failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal failed
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Store operations failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON encoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File watcher errors
    #[error("Watch error: {0}")]
    Watch(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DirftsError>;
