//! Storage Backend Module
//!
//! Defines the object-safe async trait both storage tiers implement, plus
//! the two concrete backends: a fast volatile in-memory store (primary) and
//! a durable file-per-key store (fallback).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CacheError, Result};

// == Storage Backend Trait ==
/// Uniform contract over a text-oriented key/value store.
///
/// Keys here are PHYSICAL keys: the namespace prefix has already been
/// applied by the StorageAdapter.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Reads the value stored under `key`, or None if absent.
    async fn read(&self, key: &str) -> Result<Option<String>>;

    /// Writes `value` under `key`, overwriting any existing value.
    async fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerates every stored key.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Capability probe: whether this backend can currently serve operations.
    async fn is_available(&self) -> bool;
}

// == Memory Backend ==
/// Fast volatile store used as the primary tier.
///
/// Availability and write failure can be toggled at runtime, modelling a
/// primary store that is absent or fails per-operation and forcing the
/// adapter onto its fallback path.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
    available: AtomicBool,
    failing: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates a new empty, available memory backend.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
        }
    }

    /// Marks the backend available or unavailable.
    ///
    /// An unavailable backend still answers direct calls; the adapter's
    /// probe is what routes traffic around it.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes every subsequent operation fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Storage(
                "memory backend failure injected".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        self.check_failing()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.check_failing()?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_failing()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.check_failing()?;
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

// == File Backend ==
/// Durable fallback tier storing one file per key under a root directory.
///
/// Physical keys contain characters that are not filesystem-safe (`:`, and
/// whatever the application puts in entity ids), so keys are percent-encoded
/// into file names and decoded back on enumeration.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Creates a file backend rooted at `root`. The directory is created
    /// lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            // No directory yet means nothing has been written
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };
        while let Some(item) = dir.next_entry().await? {
            if let Some(name) = item.file_name().to_str() {
                keys.push(decode_key(name));
            }
        }
        Ok(keys)
    }

    async fn is_available(&self) -> bool {
        true
    }
}

// == Key Encoding ==
/// Percent-encodes a physical key into a filesystem-safe file name.
///
/// Every byte outside `[A-Za-z0-9._-]` becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Decodes a file name produced by `encode_key` back into a physical key.
///
/// Malformed escapes are kept verbatim; the entry will then fail the
/// envelope parse and be removed as corrupt rather than crashing here.
fn decode_key(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
