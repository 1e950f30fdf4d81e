//! Configuration Module
//!
//! Handles loading and validating cache configuration.

use std::env;

use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL in milliseconds for entries stored without an explicit TTL
    pub default_ttl_ms: u64,
    /// Namespace prefix applied to every physical key, including the metadata key
    pub storage_prefix: String,
    /// Background cleanup sweep interval in milliseconds
    pub cleanup_interval_ms: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `STORAGE_PREFIX` - Key namespace prefix (default: "dotcache:")
    /// - `CLEANUP_INTERVAL_MS` - Sweep frequency in milliseconds (default: 1000)
    pub fn from_env() -> Self {
        Self {
            default_ttl_ms: env::var("DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300_000),
            storage_prefix: env::var("STORAGE_PREFIX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "dotcache:".to_string()),
            cleanup_interval_ms: env::var("CLEANUP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
        }
    }

    /// Validates the configuration.
    ///
    /// A zero TTL or sweep interval, or an empty prefix, is a programming
    /// error and is rejected at construction rather than degraded at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_ms == 0 {
            return Err(CacheError::InvalidConfig(
                "default_ttl_ms must be greater than zero".to_string(),
            ));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(CacheError::InvalidConfig(
                "cleanup_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.storage_prefix.is_empty() {
            return Err(CacheError::InvalidConfig(
                "storage_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 300_000,
            storage_prefix: "dotcache:".to_string(),
            cleanup_interval_ms: 1000,
        }
    }
}
