use std::collections::BTreeMap;

use async_trait::async_trait;
use deskfs_core::Item;
use parking_lot::RwLock;

use super::{FileStorage, StorageError, ensure_unique_names};

/// Volatile listing storage kept in process memory.
///
/// Listings are cloned on the way in and out, so callers never share state
/// with the map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    listings: RwLock<BTreeMap<String, Vec<Item>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listing keys currently present, in order.
    pub fn paths(&self) -> Vec<String> {
        self.listings.read().keys().cloned().collect()
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn list_children(&self, path: &str) -> Result<Vec<Item>, StorageError> {
        Ok(self
            .listings
            .read()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_children(&self, path: &str, items: &[Item]) -> Result<(), StorageError> {
        ensure_unique_names(path, items)?;
        self.listings
            .write()
            .insert(path.to_string(), items.to_vec());
        Ok(())
    }

    async fn remove_item(&self, path: &str, item_id: &str) -> Result<bool, StorageError> {
        let mut listings = self.listings.write();
        let Some(items) = listings.get_mut(path) else {
            return Ok(false);
        };
        let before = items.len();
        items.retain(|item| item.id != item_id);
        Ok(items.len() != before)
    }
}
