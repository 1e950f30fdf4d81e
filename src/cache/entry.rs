//! Cache Entry Module
//!
//! Defines the serialized envelope for individual cache entries with TTL
//! support. The envelope, not the raw value, is what lands in storage; a
//! stored string that fails to parse back into an envelope is corrupt.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// == Cache Entry ==
/// A single cache entry: opaque JSON payload plus TTL bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored value, serialized as arbitrary JSON
    pub value: serde_json::Value,
    /// Timestamp of last write (Unix milliseconds)
    pub created_at: i64,
    /// Time-to-live in milliseconds
    pub ttl_ms: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped at the current time.
    pub fn new(value: serde_json::Value, ttl_ms: u64) -> Self {
        Self {
            value,
            created_at: current_timestamp_ms(),
            ttl_ms,
        }
    }

    // == Expiration ==
    /// Absolute expiration timestamp (Unix milliseconds).
    ///
    /// TTLs too large for the timestamp domain clamp to `i64::MAX`, so an
    /// effectively-forever TTL stays in the future instead of wrapping
    /// into the past.
    pub fn expires_at(&self) -> i64 {
        let ttl = i64::try_from(self.ttl_ms).unwrap_or(i64::MAX);
        self.created_at.saturating_add(ttl)
    }

    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to the expiration time, so an expired entry
    /// is logically absent from every read path even before it is swept.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at()
    }

    // == Stored Form ==
    /// Serializes the envelope into its stored text form.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a stored text form back into an envelope.
    ///
    /// The envelope is always a JSON object. Serde's derived Deserialize
    /// would also coerce a sequence into the fields, so any other JSON
    /// shape is rejected as corrupt here.
    pub fn decode(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            let err = <serde_json::Error as serde::de::Error>::custom(
                "cache entry must be a JSON object",
            );
            return Err(err.into());
        }
        Ok(serde_json::from_value(value)?)
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}
