//! Error types for the caching engine
//!
//! Provides unified error handling using thiserror.
//!
//! Errors here are internal plumbing: the public CacheManager surface
//! degrades every failure to a miss or a no-op, so the only variant a
//! caller ever observes is `InvalidConfig` at construction time.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend store failed or is unavailable
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem failure in the durable tier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value or envelope failed to serialize/deserialize
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration supplied at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Wildcard pattern failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the caching engine.
pub type Result<T> = std::result::Result<T, CacheError>;
