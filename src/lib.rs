//! Dotcache - a client-side caching engine
//!
//! Provides key/value caching with per-entry TTL expiration, wildcard and
//! cascading invalidation, a two-tier storage backend (fast volatile
//! primary with a durable fallback), persisted metadata, and a background
//! cleanup cycle.

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;
pub mod tasks;

pub use cache::{CacheManager, CacheMetadata, EntityType, MetadataUpdate};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use storage::{FileBackend, MemoryBackend, StorageAdapter, StorageBackend};
pub use tasks::spawn_cleanup_task;
