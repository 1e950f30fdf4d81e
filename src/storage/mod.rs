//! Storage Module
//!
//! Provides the two-tier key/value storage layer: a backend trait with a
//! fast volatile implementation and a durable file-based implementation,
//! unified behind a namespaced StorageAdapter.

mod adapter;
mod backend;

// Re-export public types
pub use adapter::StorageAdapter;
pub use backend::{FileBackend, MemoryBackend, StorageBackend};
