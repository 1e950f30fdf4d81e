//! Storage Adapter Module
//!
//! Presents a single read/write/delete/list interface over the two storage
//! tiers, applying the namespace prefix to every physical key. Callers work
//! with logical keys and never learn which tier served an operation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::storage::StorageBackend;

// == Storage Adapter ==
/// Two-tier namespaced storage front.
///
/// Writes try the primary tier first and transparently fall back to the
/// durable tier on unavailability or failure. Reads check the primary and
/// fall through to the fallback on miss or error. Deletes are issued to
/// both tiers, since a key may live in either.
pub struct StorageAdapter {
    primary: Option<Arc<dyn StorageBackend>>,
    fallback: Arc<dyn StorageBackend>,
    prefix: String,
}

impl StorageAdapter {
    // == Constructor ==
    /// Creates an adapter over an optional primary tier and a required
    /// durable fallback, namespaced by `prefix`.
    pub fn new(
        primary: Option<Arc<dyn StorageBackend>>,
        fallback: Arc<dyn StorageBackend>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            fallback,
            prefix: prefix.into(),
        }
    }

    /// Returns the configured namespace prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Returns the primary tier only if it is present and currently probes
    /// as available.
    async fn usable_primary(&self) -> Option<&Arc<dyn StorageBackend>> {
        match &self.primary {
            Some(primary) if primary.is_available().await => Some(primary),
            _ => None,
        }
    }

    // == Read ==
    /// Reads a logical key: primary first, then the fallback tier.
    pub async fn read(&self, key: &str) -> Result<Option<String>> {
        let physical = self.physical_key(key);

        if let Some(primary) = self.usable_primary().await {
            match primary.read(&physical).await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(e) => {
                    debug!(key, error = %e, "primary read failed, trying fallback");
                }
            }
        }

        self.fallback.read(&physical).await
    }

    // == Write ==
    /// Writes a logical key to the primary tier, falling back to the durable
    /// tier on unavailability or failure.
    pub async fn write(&self, key: &str, value: &str) -> Result<()> {
        let physical = self.physical_key(key);

        if let Some(primary) = self.usable_primary().await {
            match primary.write(&physical, value).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(key, error = %e, "primary write failed, using fallback store");
                }
            }
        }

        self.fallback.write(&physical, value).await
    }

    // == Delete ==
    /// Deletes a logical key from both tiers. Idempotent; a failure on one
    /// tier does not stop the delete on the other.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let physical = self.physical_key(key);
        let mut first_error = None;

        if let Some(primary) = &self.primary {
            if let Err(e) = primary.delete(&physical).await {
                warn!(key, error = %e, "primary delete failed");
                first_error = Some(e);
            }
        }

        match self.fallback.delete(&physical).await {
            Ok(()) => Ok(()),
            Err(e) => Err(first_error.unwrap_or(e)),
        }
    }

    // == List Keys ==
    /// Enumerates every LOGICAL key in this namespace: the union of both
    /// tiers, with the prefix stripped and duplicates removed.
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        if let Some(primary) = self.usable_primary().await {
            match primary.list_keys().await {
                Ok(physical_keys) => keys.extend(physical_keys),
                Err(e) => {
                    debug!(error = %e, "primary key enumeration failed");
                }
            }
        }

        match self.fallback.list_keys().await {
            Ok(physical_keys) => keys.extend(physical_keys),
            Err(e) => {
                if keys.is_empty() {
                    return Err(CacheError::Storage(format!(
                        "key enumeration failed on both tiers: {}",
                        e
                    )));
                }
                warn!(error = %e, "fallback key enumeration failed");
            }
        }

        let mut logical: Vec<String> = keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect();
        logical.sort();
        logical.dedup();
        Ok(logical)
    }
}
