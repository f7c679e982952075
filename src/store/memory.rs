//! In-process storage backend

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{check_quota, entry_size, Storage, StoreError, DEFAULT_QUOTA_BYTES};

/// Storage kept in a map, gone when the process exits
#[derive(Debug)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    quota: u64,
}

impl MemoryStorage {
    /// Create an empty storage limited to `quota` bytes
    pub fn with_quota(quota: u64) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);

        let usage: u64 = items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| entry_size(k, v.len() as u64))
            .sum();
        check_quota(key, usage, value.len() as u64, self.quota)?;

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
