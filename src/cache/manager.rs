//! Cache Manager Module
//!
//! The façade the application layer talks to: get/set, the invalidation
//! family, staleness checks, metadata updates, and lifecycle control over
//! the background cleanup task.
//!
//! No operation here raises to the caller under backend failure. Failures
//! degrade to a miss or a no-op with a log line; the only surfaced error is
//! an invalid configuration at construction time.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::metadata::{CacheMetadata, MetadataStore, MetadataUpdate, METADATA_KEY};
use crate::cache::rules::{compile_pattern, EntityType, InvalidationRuleManager};
use crate::cache::CacheEntry;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::storage::{StorageAdapter, StorageBackend};
use crate::tasks::spawn_cleanup_task;

// == Cache Manager ==
/// Client-side cache with TTL expiration, wildcard and cascade
/// invalidation, tiered storage, and persisted metadata.
///
/// Explicitly constructed and explicitly owned; share between consumers
/// with `Arc`. `destroy()` (or dropping the manager) stops the background
/// sweep.
pub struct CacheManager {
    config: CacheConfig,
    adapter: Arc<StorageAdapter>,
    rules: InvalidationRuleManager,
    metadata_store: MetadataStore,
    metadata: RwLock<CacheMetadata>,
    cleanup: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CacheManager {
    // == Constructor ==
    /// Builds a manager over a primary (fast, possibly absent) tier and a
    /// durable fallback tier, namespaced by the configured prefix.
    ///
    /// Validates the configuration, loads or initializes the metadata
    /// record, and starts the cleanup task. Configuration errors are the
    /// only failure surfaced to the caller.
    pub async fn new(
        config: CacheConfig,
        primary: Option<Arc<dyn StorageBackend>>,
        fallback: Arc<dyn StorageBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let adapter = Arc::new(StorageAdapter::new(
            primary,
            fallback,
            config.storage_prefix.clone(),
        ));

        let metadata_store = MetadataStore::new(adapter.clone());
        let metadata = metadata_store.load_or_init().await?;

        let cleanup = spawn_cleanup_task(adapter.clone(), config.cleanup_interval_ms);

        Ok(Self {
            config,
            adapter,
            rules: InvalidationRuleManager::new(),
            metadata_store,
            metadata: RwLock::new(metadata),
            cleanup: std::sync::Mutex::new(Some(cleanup)),
        })
    }

    // == Get ==
    /// Retrieves and deserializes the value under `key`.
    ///
    /// Returns None for absent, expired, or unreadable entries. Corrupt
    /// entries are deleted as a side effect; a valid hit has no side
    /// effect.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.read_entry(key).await?;
        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "cached payload does not match requested shape, removing");
                self.delete_quiet(key).await;
                None
            }
        }
    }

    // == Set ==
    /// Serializes `value` and stores it under `key` with `ttl_ms` or the
    /// configured default TTL. Never raises: failures are logged and the
    /// cache simply stays stale.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_ms: Option<u64>) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "value failed to serialize, skipping cache write");
                return;
            }
        };

        let entry = CacheEntry::new(value, ttl_ms.unwrap_or(self.config.default_ttl_ms));
        let raw = match entry.encode() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "entry failed to encode, skipping cache write");
                return;
            }
        };

        if let Err(e) = self.adapter.write(key, &raw).await {
            warn!(key, error = %e, "cache write failed");
        }
    }

    // == Invalidate ==
    /// Deletes one entry. Idempotent; failures are logged and swallowed.
    pub async fn invalidate(&self, key: &str) {
        self.delete_quiet(key).await;
    }

    /// Deletes a batch of entries.
    pub async fn invalidate_many<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            self.delete_quiet(key.as_ref()).await;
        }
    }

    // == Invalidate Pattern ==
    /// Deletes every currently-stored key matching a wildcard pattern.
    ///
    /// Matching runs over a snapshot of the key space taken at invocation
    /// time; keys written afterwards are unaffected.
    pub async fn invalidate_pattern(&self, pattern: &str) {
        let matcher = match compile_pattern(pattern) {
            Ok(matcher) => matcher,
            Err(e) => {
                warn!(pattern, error = %e, "invalid invalidation pattern");
                return;
            }
        };

        let keys = self.snapshot_keys().await;
        let mut removed = 0usize;
        for key in keys {
            if matcher.is_match(&key) {
                self.delete_quiet(&key).await;
                removed += 1;
            }
        }
        debug!(pattern, removed, "pattern invalidation complete");
    }

    // == Invalidate With Cascade ==
    /// Invalidates `key` and every related pattern for the given entity
    /// type, per the cascade rule table.
    ///
    /// The user scope for cascade patterns is parsed from the key's
    /// `user:<id>:` segment; keys outside that convention cascade with an
    /// empty scope and match nothing user-scoped.
    pub async fn invalidate_with_cascade(
        &self,
        key: &str,
        entity_type: EntityType,
        entity_id: &str,
    ) {
        self.delete_quiet(key).await;

        let user_id = parse_user_scope(key).unwrap_or_default();
        for pattern in self
            .rules
            .cascade_patterns(entity_type, &user_id, entity_id)
        {
            self.invalidate_pattern(&pattern).await;
        }
    }

    // == Invalidate By Operation ==
    /// Convenience wrapper for the data-access layer: derives an
    /// entity-scoped key from the caller's identifiers and forwards to
    /// cascade invalidation when an entity type is supplied. Never raises.
    pub async fn invalidate_by_operation(
        &self,
        operation: &str,
        user_id: &str,
        entity_id: Option<&str>,
        entity_type: Option<EntityType>,
    ) {
        let key = match (entity_id, entity_type) {
            (Some(id), Some(entity)) => format!("user:{}:{}:{}", user_id, entity.category(), id),
            (Some(id), None) => format!("user:{}:{}:{}", user_id, operation, id),
            (None, _) => format!("user:{}:{}", user_id, operation),
        };

        match entity_type {
            Some(entity) => {
                self.invalidate_with_cascade(&key, entity, entity_id.unwrap_or_default())
                    .await
            }
            None => self.invalidate(&key).await,
        }
    }

    // == Invalidate User ==
    /// Deletes every key scoped to `user_id` (prefix match on the
    /// user-scoped namespace segment). Other users' keys are untouched.
    pub async fn invalidate_user(&self, user_id: &str) {
        let scope = format!("user:{}:", user_id);
        let keys = self.snapshot_keys().await;
        for key in keys {
            if key.starts_with(&scope) {
                self.delete_quiet(&key).await;
            }
        }
    }

    // == Invalidate Session ==
    /// Deletes every entry except the metadata record. Corrupt entries
    /// encountered during the sweep are removed rather than failing.
    pub async fn invalidate_session(&self, session_id: &str) {
        debug!(session_id, "invalidating session-scoped entries");
        let keys = self.snapshot_keys().await;
        for key in keys {
            if key != METADATA_KEY {
                self.delete_quiet(&key).await;
            }
        }
    }

    // == Staleness ==
    /// True when no valid, unexpired entry exists for `key`.
    pub async fn is_stale(&self, key: &str) -> bool {
        !self.validate_freshness(key).await
    }

    /// True when a valid, unexpired entry exists for `key`. Exact logical
    /// negation of `is_stale`.
    pub async fn validate_freshness(&self, key: &str) -> bool {
        self.read_entry(key).await.is_some()
    }

    // == Refresh Stale Data ==
    /// Synchronous sweep on demand: removes expired and unreadable entries
    /// immediately instead of waiting for the next cleanup tick. Does not
    /// repopulate; observing removal and refetching is the caller's job.
    pub async fn refresh_stale_data(&self) {
        let removed = sweep_expired(&self.adapter).await;
        if removed > 0 {
            info!(removed, "manual sweep removed stale entries");
        }
    }

    // == Metadata ==
    /// Merges the given fields into the metadata record and persists it,
    /// refreshing `last_sync`.
    pub async fn update_metadata(&self, update: MetadataUpdate) {
        let mut metadata = self.metadata.write().await;
        metadata.merge(update);
        if let Err(e) = self.metadata_store.persist(&metadata).await {
            warn!(error = %e, "metadata persist failed");
        }
    }

    /// Snapshot of the current metadata record.
    pub async fn metadata(&self) -> CacheMetadata {
        self.metadata.read().await.clone()
    }

    // == Clear ==
    /// Removes everything in the namespace, metadata included, then
    /// re-persists a fresh default record so exactly one metadata record
    /// continues to exist per namespace.
    pub async fn clear(&self) {
        let keys = self.snapshot_keys().await;
        for key in keys {
            self.delete_quiet(&key).await;
        }

        let mut metadata = self.metadata.write().await;
        *metadata = CacheMetadata::default();
        if let Err(e) = self.metadata_store.persist(&metadata).await {
            warn!(error = %e, "metadata reinit after clear failed");
        }
    }

    // == Destroy ==
    /// Cancels the cleanup task. Safe to call any number of times; no
    /// sweep fires afterward. In-flight storage operations already issued
    /// are not aborted.
    pub fn destroy(&self) {
        // A poisoned lock must not leave the sweep running forever
        let handle = self
            .cleanup
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("cleanup task cancelled");
        }
    }

    // == Internal Read Path ==
    /// Shared read path for get and staleness checks.
    ///
    /// Absent and expired entries yield None. Corrupt entries yield None
    /// and are deleted as a side effect.
    async fn read_entry(&self, key: &str) -> Option<CacheEntry> {
        // The metadata record is not an entry envelope; never parse or
        // delete it through the entry read path.
        if key == METADATA_KEY {
            return None;
        }

        let raw = match self.adapter.read(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!(key, error = %e, "cache read failed");
                return None;
            }
        };

        match CacheEntry::decode(&raw) {
            Ok(entry) if entry.is_expired() => None,
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "corrupt cache entry, removing");
                self.delete_quiet(key).await;
                None
            }
        }
    }

    /// Delete with logged-and-swallowed failure.
    async fn delete_quiet(&self, key: &str) {
        if let Err(e) = self.adapter.delete(key).await {
            warn!(key, error = %e, "cache delete failed");
        }
    }

    /// Point-in-time enumeration of logical keys; empty on failure.
    async fn snapshot_keys(&self) -> Vec<String> {
        match self.adapter.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "key enumeration failed");
                Vec::new()
            }
        }
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

// == Key Helpers ==
/// Extracts the user id from a `user:<id>:...` key.
fn parse_user_scope(key: &str) -> Option<String> {
    let rest = key.strip_prefix("user:")?;
    let (user_id, _) = rest.split_once(':')?;
    if user_id.is_empty() {
        None
    } else {
        Some(user_id.to_string())
    }
}

// == Sweep ==
/// Removes every expired or unreadable entry in the adapter's namespace,
/// skipping the metadata record. Operates on a point-in-time key
/// enumeration, so entries written after the sweep begins are not
/// considered. Returns the number of entries removed.
pub async fn sweep_expired(adapter: &StorageAdapter) -> usize {
    let keys = match adapter.list_keys().await {
        Ok(keys) => keys,
        Err(e) => {
            warn!(error = %e, "sweep skipped: key enumeration failed");
            return 0;
        }
    };

    let mut removed = 0usize;
    for key in keys {
        if key == METADATA_KEY {
            continue;
        }

        let raw = match adapter.read(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(e) => {
                debug!(key, error = %e, "sweep read failed");
                continue;
            }
        };

        let expired = match CacheEntry::decode(&raw) {
            Ok(entry) => entry.is_expired(),
            // Unreadable entries are swept along with expired ones
            Err(_) => true,
        };

        if expired {
            match adapter.delete(&key).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(key, error = %e, "sweep delete failed"),
            }
        }
    }

    removed
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;

    async fn manager() -> CacheManager {
        manager_with_config(CacheConfig {
            default_ttl_ms: 60_000,
            storage_prefix: "test:".to_string(),
            // Long interval keeps the background sweep out of unit tests
            cleanup_interval_ms: 3_600_000,
        })
        .await
    }

    async fn manager_with_config(config: CacheConfig) -> CacheManager {
        let primary = Arc::new(MemoryBackend::new()) as Arc<dyn StorageBackend>;
        let fallback = Arc::new(MemoryBackend::new()) as Arc<dyn StorageBackend>;
        CacheManager::new(config, Some(primary), fallback)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get_roundtrip() {
        let cache = manager().await;

        cache
            .set("user:1:collections", &json!({"id": "1"}), None)
            .await;
        let value: Option<serde_json::Value> = cache.get("user:1:collections").await;

        assert_eq!(value, Some(json!({"id": "1"})));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let cache = manager().await;
        let value: Option<serde_json::Value> = cache.get("nope").await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_logically_absent() {
        let cache = manager().await;

        cache.set("user:1:collections", &json!({"id": "1"}), Some(100)).await;
        assert!(cache.validate_freshness("user:1:collections").await);

        sleep(Duration::from_millis(150)).await;

        let value: Option<serde_json::Value> = cache.get("user:1:collections").await;
        assert_eq!(value, None);
        assert!(cache.is_stale("user:1:collections").await);
        assert!(!cache.validate_freshness("user:1:collections").await);
    }

    #[tokio::test]
    async fn test_staleness_of_never_set_key() {
        let cache = manager().await;
        assert!(cache.is_stale("never-set").await);
        assert!(!cache.validate_freshness("never-set").await);
    }

    #[tokio::test]
    async fn test_set_refreshes_ttl() {
        let cache = manager().await;

        cache.set("k", &json!(1), Some(200)).await;
        sleep(Duration::from_millis(120)).await;
        cache.set("k", &json!(2), Some(200)).await;
        sleep(Duration::from_millis(120)).await;

        // Rewrite reset created_at, so the entry is still fresh
        let value: Option<serde_json::Value> = cache.get("k").await;
        assert_eq!(value, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let cache = manager().await;

        cache.set("k", &json!("v"), None).await;
        cache.invalidate("k").await;
        cache.invalidate("k").await;
        cache.invalidate("never-existed").await;

        let value: Option<serde_json::Value> = cache.get("k").await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_invalidate_pattern_scopes_exactly() {
        let cache = manager().await;

        for key in [
            "user:123:collections:active",
            "user:123:collections:archived",
            "user:123:dots:collection-1",
            "user:456:collections:active",
        ] {
            cache.set(key, &json!("v"), None).await;
        }

        cache.invalidate_pattern("user:123:collections:*").await;

        let gone: Option<serde_json::Value> = cache.get("user:123:collections:active").await;
        let gone2: Option<serde_json::Value> = cache.get("user:123:collections:archived").await;
        let kept: Option<serde_json::Value> = cache.get("user:123:dots:collection-1").await;
        let kept2: Option<serde_json::Value> = cache.get("user:456:collections:active").await;

        assert_eq!(gone, None);
        assert_eq!(gone2, None);
        assert_eq!(kept, Some(json!("v")));
        assert_eq!(kept2, Some(json!("v")));
    }

    #[tokio::test]
    async fn test_cascade_collection_removes_aggregate() {
        let cache = manager().await;

        cache.set("user:123:collections", &json!(["c-1"]), None).await;
        cache.set("user:123:collection:c-1", &json!({"id": "c-1"}), None).await;
        cache.set("user:123:snapshots:s-1", &json!("snap"), None).await;

        cache
            .invalidate_with_cascade("user:123:collection:c-1", EntityType::Collection, "c-1")
            .await;

        let aggregate: Option<serde_json::Value> = cache.get("user:123:collections").await;
        let scoped: Option<serde_json::Value> = cache.get("user:123:collection:c-1").await;
        let unrelated: Option<serde_json::Value> = cache.get("user:123:snapshots:s-1").await;

        assert_eq!(aggregate, None);
        assert_eq!(scoped, None);
        assert_eq!(unrelated, Some(json!("snap")));
    }

    #[tokio::test]
    async fn test_cascade_snapshot_leaves_aggregate() {
        let cache = manager().await;

        cache.set("user:123:collections", &json!(["c-1"]), None).await;
        cache.set("user:123:snapshot:s-1", &json!("snap"), None).await;

        cache
            .invalidate_with_cascade("user:123:snapshot:s-1", EntityType::Snapshot, "s-1")
            .await;

        let aggregate: Option<serde_json::Value> = cache.get("user:123:collections").await;
        let snapshot: Option<serde_json::Value> = cache.get("user:123:snapshot:s-1").await;

        assert_eq!(aggregate, Some(json!(["c-1"])));
        assert_eq!(snapshot, None);
    }

    #[tokio::test]
    async fn test_cascade_dot_hits_parent_aggregate_only() {
        let cache = manager().await;

        cache.set("user:123:collections", &json!(["c-1"]), None).await;
        cache.set("user:123:collection:c-2", &json!({"id": "c-2"}), None).await;
        cache.set("user:123:dots:c-1", &json!(["d-1"]), None).await;

        cache
            .invalidate_with_cascade("user:123:dots:c-1", EntityType::Dot, "d-1")
            .await;

        let aggregate: Option<serde_json::Value> = cache.get("user:123:collections").await;
        let sibling: Option<serde_json::Value> = cache.get("user:123:collection:c-2").await;

        assert_eq!(aggregate, None);
        assert_eq!(sibling, Some(json!({"id": "c-2"})));
    }

    #[tokio::test]
    async fn test_invalidate_by_operation_with_entity() {
        let cache = manager().await;

        cache.set("user:9:collections", &json!([]), None).await;
        cache.set("user:9:collection:c-3", &json!({}), None).await;

        cache
            .invalidate_by_operation("updateCollection", "9", Some("c-3"), Some(EntityType::Collection))
            .await;

        let aggregate: Option<serde_json::Value> = cache.get("user:9:collections").await;
        let scoped: Option<serde_json::Value> = cache.get("user:9:collection:c-3").await;
        assert_eq!(aggregate, None);
        assert_eq!(scoped, None);
    }

    #[tokio::test]
    async fn test_invalidate_by_operation_without_entity_type() {
        let cache = manager().await;

        cache.set("user:9:profile", &json!({"name": "a"}), None).await;
        cache.set("user:9:collections", &json!([]), None).await;

        cache
            .invalidate_by_operation("profile", "9", None, None)
            .await;

        let profile: Option<serde_json::Value> = cache.get("user:9:profile").await;
        let untouched: Option<serde_json::Value> = cache.get("user:9:collections").await;
        assert_eq!(profile, None);
        assert_eq!(untouched, Some(json!([])));
    }

    #[tokio::test]
    async fn test_invalidate_user_spares_other_users() {
        let cache = manager().await;

        cache.set("user:123:collections", &json!([]), None).await;
        cache.set("user:123:dots:c-1", &json!([]), None).await;
        cache.set("user:456:collections", &json!([]), None).await;

        cache.invalidate_user("123").await;

        let a: Option<serde_json::Value> = cache.get("user:123:collections").await;
        let b: Option<serde_json::Value> = cache.get("user:123:dots:c-1").await;
        let c: Option<serde_json::Value> = cache.get("user:456:collections").await;
        assert_eq!(a, None);
        assert_eq!(b, None);
        assert_eq!(c, Some(json!([])));
    }

    #[tokio::test]
    async fn test_invalidate_session_keeps_metadata() {
        let cache = manager().await;

        cache.set("user:123:collections", &json!([]), None).await;
        cache.set("user:456:collections", &json!([]), None).await;

        cache.invalidate_session("session-7").await;

        let a: Option<serde_json::Value> = cache.get("user:123:collections").await;
        let b: Option<serde_json::Value> = cache.get("user:456:collections").await;
        assert_eq!(a, None);
        assert_eq!(b, None);

        // Metadata record survived
        assert_eq!(cache.metadata().await.version, crate::cache::SCHEMA_VERSION);
        let stored = cache.adapter.read(METADATA_KEY).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_entry_removed_on_read() {
        let cache = manager().await;

        cache.adapter.write("bad", "{ definitely not an entry").await.unwrap();

        let value: Option<serde_json::Value> = cache.get("bad").await;
        assert_eq!(value, None);
        // Physically removed, not just ignored
        assert_eq!(cache.adapter.read("bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_stale_data_sweeps_selectively() {
        let cache = manager().await;

        cache.set("fresh", &json!("keep"), Some(60_000)).await;
        cache.set("doomed", &json!("drop"), Some(20)).await;
        cache.adapter.write("corrupt", "garbage").await.unwrap();

        sleep(Duration::from_millis(50)).await;
        cache.refresh_stale_data().await;

        assert_eq!(cache.adapter.read("doomed").await.unwrap(), None);
        assert_eq!(cache.adapter.read("corrupt").await.unwrap(), None);
        let fresh: Option<serde_json::Value> = cache.get("fresh").await;
        assert_eq!(fresh, Some(json!("keep")));
    }

    #[tokio::test]
    async fn test_update_metadata_merges_and_persists() {
        let cache = manager().await;

        cache
            .update_metadata(MetadataUpdate {
                user_id: Some("user-1".to_string()),
                session_id: None,
            })
            .await;
        cache
            .update_metadata(MetadataUpdate {
                user_id: None,
                session_id: Some("session-1".to_string()),
            })
            .await;

        let metadata = cache.metadata().await;
        assert_eq!(metadata.user_id.as_deref(), Some("user-1"));
        assert_eq!(metadata.session_id.as_deref(), Some("session-1"));

        // Persisted form matches
        let raw = cache.adapter.read(METADATA_KEY).await.unwrap().unwrap();
        let stored: CacheMetadata = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.user_id.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_clear_resets_namespace_and_metadata() {
        let cache = manager().await;

        cache.set("user:1:collections", &json!([]), None).await;
        cache
            .update_metadata(MetadataUpdate {
                user_id: Some("user-1".to_string()),
                session_id: None,
            })
            .await;

        cache.clear().await;

        let value: Option<serde_json::Value> = cache.get("user:1:collections").await;
        assert_eq!(value, None);

        // Exactly one fresh metadata record remains
        let metadata = cache.metadata().await;
        assert!(metadata.user_id.is_none());
        let keys = cache.adapter.list_keys().await.unwrap();
        assert_eq!(keys, vec![METADATA_KEY.to_string()]);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let cache = manager().await;
        cache.destroy();
        cache.destroy();
        cache.destroy();
    }

    #[tokio::test]
    async fn test_destroy_cancels_despite_poisoned_lock() {
        let cache = Arc::new(manager().await);

        // Poison the cleanup lock from another thread
        let poisoner = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.cleanup.lock().unwrap();
            panic!("poison the cleanup lock");
        })
        .join();

        cache.destroy();

        let guard = cache.cleanup.lock().unwrap_or_else(|e| e.into_inner());
        assert!(guard.is_none(), "cleanup task should be taken and aborted");
    }

    #[tokio::test]
    async fn test_metadata_record_survives_entry_reads() {
        let cache = manager().await;

        // The metadata key read through the entry path is a plain miss
        let value: Option<serde_json::Value> = cache.get(METADATA_KEY).await;
        assert_eq!(value, None);
        assert!(cache.is_stale(METADATA_KEY).await);

        // The persisted record was not deleted as corrupt
        let raw = cache.adapter.read(METADATA_KEY).await.unwrap();
        let raw = raw.expect("metadata record should still exist");
        assert!(serde_json::from_str::<CacheMetadata>(&raw).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_construction() {
        let primary = Arc::new(MemoryBackend::new()) as Arc<dyn StorageBackend>;
        let fallback = Arc::new(MemoryBackend::new()) as Arc<dyn StorageBackend>;
        let config = CacheConfig {
            cleanup_interval_ms: 0,
            ..CacheConfig::default()
        };

        let result = CacheManager::new(config, Some(primary), fallback).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_user_scope() {
        assert_eq!(
            parse_user_scope("user:123:collections"),
            Some("123".to_string())
        );
        assert_eq!(parse_user_scope("user::collections"), None);
        assert_eq!(parse_user_scope("metadata"), None);
        assert_eq!(parse_user_scope("user:123"), None);
    }
}
