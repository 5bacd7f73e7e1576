//! Listing storage: a flat map from a folder path to the ordered items directly
//! inside it.

use std::collections::HashSet;

use async_trait::async_trait;
use deskfs_core::Item;
use thiserror::Error;

mod memory;
mod remote;
mod sqlite;

pub use memory::MemoryStorage;
pub use remote::RemoteStorage;
pub use sqlite::SqliteStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate name {name:?} in listing {path:?}")]
    DuplicateName { path: String, name: String },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Items directly under `path`; empty when the path was never written.
    async fn list_children(&self, path: &str) -> Result<Vec<Item>, StorageError>;

    /// Overwrites the whole listing at `path`.
    async fn replace_children(&self, path: &str, items: &[Item]) -> Result<(), StorageError>;

    /// Removes one item by id, reporting whether anything was removed.
    async fn remove_item(&self, path: &str, item_id: &str) -> Result<bool, StorageError>;
}

pub(crate) fn ensure_unique_names(path: &str, items: &[Item]) -> Result<(), StorageError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.name.as_str()) {
            return Err(StorageError::DuplicateName {
                path: path.to_string(),
                name: item.name.clone(),
            });
        }
    }
    Ok(())
}
