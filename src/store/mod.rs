//! Post store - persistent key/value storage for raw post documents
//!
//! The store is built over a [`Storage`] capability so the backing medium can
//! be swapped: [`FileStorage`] persists outside the process, [`MemoryStorage`]
//! lives only as long as the process does.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::sync::Arc;
use thiserror::Error;

/// Prefix of every post key
pub const KEY_PREFIX: &str = "blogPost_";

/// Default quota, the usual per-origin browser storage limit
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "storage quota exceeded: writing '{key}' would use {required} bytes of a {quota} byte quota"
    )]
    CapacityExceeded {
        key: String,
        required: u64,
        quota: u64,
    },

    #[error("stored value for '{key}' is not valid UTF-8")]
    Corrupt { key: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A string key/value medium.
///
/// Writes replace the previous value for the key entirely. A write that
/// would take total usage above the quota fails with
/// [`StoreError::CapacityExceeded`] and leaves the store unchanged.
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Storage key for a post slug
pub fn storage_key(slug: &str) -> String {
    format!("{}{}", KEY_PREFIX, slug)
}

/// Bytes an entry counts against the quota
fn entry_size(key: &str, value_len: u64) -> u64 {
    key.len() as u64 + value_len
}

/// Fail unless `usage` (excluding any previous value of `key`) plus the new
/// entry fits in `quota`
fn check_quota(key: &str, usage: u64, value_len: u64, quota: u64) -> Result<(), StoreError> {
    let required = usage + entry_size(key, value_len);
    if required > quota {
        return Err(StoreError::CapacityExceeded {
            key: key.to_string(),
            required,
            quota,
        });
    }
    Ok(())
}

/// Raw post documents keyed by slug
#[derive(Clone)]
pub struct PostStore {
    storage: Arc<dyn Storage>,
}

impl PostStore {
    /// Create a store over the given backend
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// A store that lives only in this process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }

    /// Read the raw document for `slug`, `None` if it was never written
    pub fn get(&self, slug: &str) -> Result<Option<String>, StoreError> {
        self.storage.get_item(&storage_key(slug))
    }

    /// Write the raw document for `slug`, replacing any previous one
    pub fn set(&self, slug: &str, raw: &str) -> Result<(), StoreError> {
        let key = storage_key(slug);
        self.storage.set_item(&key, raw)?;
        tracing::debug!("Stored {} ({} bytes)", key, raw.len());
        Ok(())
    }
}

impl std::fmt::Debug for PostStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostStore").finish_non_exhaustive()
    }
}
