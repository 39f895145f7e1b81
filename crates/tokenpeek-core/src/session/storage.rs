use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Session storage is unavailable")]
    Unavailable,
}

/// Tab-scoped key-value storage, the shape of a browser's `sessionStorage`.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory session storage shared by every clone of the handle.
/// Clone is cheap - the map sits behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.read().map_err(|_| StorageError::Unavailable)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Unavailable)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Unavailable)?;
        items.remove(key);
        Ok(())
    }
}
