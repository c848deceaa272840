//! In-process storage backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use super::{LocalStorage, StorageError, validate_key};

/// Storage held in a map for the lifetime of the process.
///
/// Can be switched off with [`MemoryStorage::set_available`] to behave like a
/// browser with storage disabled.
#[derive(Debug)]
pub struct MemoryStorage {
    records: Mutex<HashMap<String, Value>>,
    available: AtomicBool,
}

impl MemoryStorage {
    /// Create empty, available storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Enable or disable the storage. While disabled every call fails with
    /// [`StorageError::Unavailable`]; records are kept.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn with_records<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Value>) -> T,
    ) -> Result<T, StorageError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable);
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| StorageError::Unavailable)?;
        Ok(f(&mut records))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        validate_key(key)?;
        self.with_records(|records| records.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        validate_key(key)?;
        self.with_records(|records| {
            records.insert(key.to_owned(), value.clone());
        })
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.with_records(|records| {
            records.remove(key);
        })
    }
}
