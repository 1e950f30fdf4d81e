//! Cache Metadata Module
//!
//! Persists a small fixed-shape record (schema version, active identifiers,
//! last-sync timestamp) across process restarts. Exactly one record exists
//! per namespace, stored under the `metadata` logical key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::storage::StorageAdapter;

/// Logical key the metadata record is stored under.
pub const METADATA_KEY: &str = "metadata";

/// Schema version written into freshly created metadata records.
pub const SCHEMA_VERSION: &str = "1.0.0";

// == Cache Metadata ==
/// The persisted metadata record.
///
/// `user_id` and `session_id` are set by the owning application and are
/// never interpreted by the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Schema version, fixed at creation
    pub version: String,
    /// Identifier of the currently active user, if any
    pub user_id: Option<String>,
    /// Identifier of the currently active session, if any
    pub session_id: Option<String>,
    /// Timestamp of the last metadata update
    pub last_sync: DateTime<Utc>,
}

impl Default for CacheMetadata {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            user_id: None,
            session_id: None,
            last_sync: Utc::now(),
        }
    }
}

// == Metadata Update ==
/// Partial-merge shape for `update_metadata`: present fields overwrite,
/// absent fields are preserved.
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl CacheMetadata {
    /// Merges a partial update into this record, refreshing `last_sync`.
    pub fn merge(&mut self, update: MetadataUpdate) {
        if let Some(user_id) = update.user_id {
            self.user_id = Some(user_id);
        }
        if let Some(session_id) = update.session_id {
            self.session_id = Some(session_id);
        }
        self.last_sync = Utc::now();
    }
}

// == Metadata Store ==
/// Load/persist layer for the metadata record, on top of StorageAdapter.
pub struct MetadataStore {
    adapter: Arc<StorageAdapter>,
}

impl MetadataStore {
    /// Creates a metadata store over the given adapter.
    pub fn new(adapter: Arc<StorageAdapter>) -> Self {
        Self { adapter }
    }

    // == Load Or Init ==
    /// Loads the metadata record, creating and persisting a fresh default
    /// when it is absent or corrupt.
    pub async fn load_or_init(&self) -> Result<CacheMetadata> {
        match self.adapter.read(METADATA_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<CacheMetadata>(&raw) {
                Ok(metadata) => return Ok(metadata),
                Err(e) => {
                    warn!(error = %e, "corrupt metadata record, reinitializing");
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "metadata load failed, reinitializing");
            }
        }

        let fresh = CacheMetadata::default();
        self.persist(&fresh).await?;
        Ok(fresh)
    }

    // == Persist ==
    /// Writes the metadata record to storage.
    pub async fn persist(&self, metadata: &CacheMetadata) -> Result<()> {
        let raw = serde_json::to_string(metadata)?;
        self.adapter.write(METADATA_KEY, &raw).await
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBackend, StorageBackend};

    fn store() -> (Arc<StorageAdapter>, MetadataStore) {
        let fallback = Arc::new(MemoryBackend::new()) as Arc<dyn StorageBackend>;
        let adapter = Arc::new(StorageAdapter::new(None, fallback, "test:"));
        (adapter.clone(), MetadataStore::new(adapter))
    }

    #[tokio::test]
    async fn test_load_or_init_creates_default() {
        let (adapter, store) = store();

        let metadata = store.load_or_init().await.unwrap();
        assert_eq!(metadata.version, SCHEMA_VERSION);
        assert!(metadata.user_id.is_none());
        assert!(metadata.session_id.is_none());

        // The fresh record was persisted immediately
        assert!(adapter.read(METADATA_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_load_or_init_reads_existing() {
        let (_, store) = store();

        let mut metadata = store.load_or_init().await.unwrap();
        metadata.merge(MetadataUpdate {
            user_id: Some("user-9".to_string()),
            session_id: None,
        });
        store.persist(&metadata).await.unwrap();

        let reloaded = store.load_or_init().await.unwrap();
        assert_eq!(reloaded.user_id.as_deref(), Some("user-9"));
    }

    #[tokio::test]
    async fn test_load_or_init_recovers_from_corruption() {
        let (adapter, store) = store();

        adapter.write(METADATA_KEY, "{ not metadata").await.unwrap();

        let metadata = store.load_or_init().await.unwrap();
        assert_eq!(metadata.version, SCHEMA_VERSION);
        assert!(metadata.user_id.is_none());

        // Corrupt record was replaced with a parseable one
        let raw = adapter.read(METADATA_KEY).await.unwrap().unwrap();
        assert!(serde_json::from_str::<CacheMetadata>(&raw).is_ok());
    }

    #[tokio::test]
    async fn test_merge_preserves_absent_fields() {
        let mut metadata = CacheMetadata::default();
        metadata.merge(MetadataUpdate {
            user_id: Some("user-1".to_string()),
            session_id: Some("session-1".to_string()),
        });

        let before_sync = metadata.last_sync;
        metadata.merge(MetadataUpdate {
            user_id: Some("user-2".to_string()),
            session_id: None,
        });

        assert_eq!(metadata.user_id.as_deref(), Some("user-2"));
        assert_eq!(metadata.session_id.as_deref(), Some("session-1"));
        assert!(metadata.last_sync >= before_sync);
    }
}
