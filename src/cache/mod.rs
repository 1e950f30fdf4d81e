//! Cache Module
//!
//! The caching core: entry envelope, persisted metadata, invalidation
//! rules, and the CacheManager façade.

mod entry;
mod manager;
mod metadata;
mod rules;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use manager::{sweep_expired, CacheManager};
pub use metadata::{CacheMetadata, MetadataStore, MetadataUpdate, METADATA_KEY, SCHEMA_VERSION};
pub use rules::{compile_pattern, EntityType, InvalidationRuleManager};
