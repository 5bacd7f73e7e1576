//! File operations over path-keyed listings.
//!
//! The engine holds no state between calls. Every operation reads the
//! listings it needs, mutates them in memory and writes them back, so
//! concurrent operations on overlapping paths can lose updates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use deskfs_core::{Item, icon_for};
use serde::Serialize;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::paths;
use crate::storage::{FileStorage, StorageError};
use crate::validation::{ValidationError, validate_name};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("item {id} not found in {path:?}")]
    NotFound { path: String, id: String },
    #[error("an item named {name:?} already exists in {path:?}")]
    AlreadyExists { path: String, name: String },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl FsError {
    /// Transient failures a caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FsError::StorageUnavailable(_))
    }
}

impl From<ValidationError> for FsError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidName(reason) => FsError::InvalidName(reason),
            ValidationError::InvalidPath(reason) => FsError::InvalidPath(reason),
        }
    }
}

impl From<StorageError> for FsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateName { path, name } => FsError::AlreadyExists { path, name },
            StorageError::Unavailable(reason) => FsError::StorageUnavailable(reason),
            StorageError::Backend(reason) => FsError::Storage(reason),
        }
    }
}

/// One item of a recursive snapshot; folders carry their children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub item: Item,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

#[derive(Clone)]
pub struct FileEngine {
    storage: Arc<dyn FileStorage>,
}

impl FileEngine {
    pub fn new(storage: Arc<dyn FileStorage>) -> Self {
        Self { storage }
    }

    pub async fn create_folder(&self, path: &str, name: &str) -> Result<Item, FsError> {
        validate_name(name)?;
        let parent = paths::normalize(path);
        let item = Item::folder(new_id(), name, paths::join(&parent, name), today());
        self.insert_new(&parent, item.clone()).await?;
        self.storage.replace_children(&item.path, &[]).await?;
        tracing::info!(path = %item.path, id = %item.id, "folder created");
        Ok(item)
    }

    pub async fn create_file(
        &self,
        path: &str,
        name: &str,
        content: Option<String>,
        size: u64,
    ) -> Result<Item, FsError> {
        validate_name(name)?;
        let parent = paths::normalize(path);
        let item = Item::file(
            new_id(),
            name,
            paths::join(&parent, name),
            today(),
            size,
            content,
        );
        self.insert_new(&parent, item.clone()).await?;
        tracing::info!(path = %item.path, id = %item.id, size, "file created");
        Ok(item)
    }

    pub async fn rename_item(
        &self,
        path: &str,
        item_id: &str,
        new_name: &str,
    ) -> Result<Item, FsError> {
        let parent = paths::normalize(path);
        let mut listing = self.storage.list_children(&parent).await?;
        let index = find_index(&listing, &parent, item_id)?;
        if listing
            .iter()
            .any(|other| other.id != item_id && other.name == new_name)
        {
            return Err(already_exists(&parent, new_name));
        }

        let item = &mut listing[index];
        let old_path = paths::join(&parent, &item.name);
        item.name = new_name.to_string();
        item.path = paths::join(&parent, new_name);
        item.icon = icon_for(new_name, item.item_type()).to_string();
        item.modified = today();
        let renamed = item.clone();

        self.storage.replace_children(&parent, &listing).await?;
        if renamed.is_folder() && old_path != renamed.path {
            self.rekey_subtree(&old_path, &renamed.path).await?;
        }
        tracing::info!(from = %old_path, to = %renamed.path, id = %renamed.id, "item renamed");
        Ok(renamed)
    }

    pub async fn delete_item(&self, path: &str, item_id: &str) -> Result<(), FsError> {
        let parent = paths::normalize(path);
        let listing = self.storage.list_children(&parent).await?;
        let index = find_index(&listing, &parent, item_id)?;
        let item = &listing[index];

        if item.is_folder() {
            let mut pending = vec![paths::join(&parent, &item.name)];
            let mut cleared = 0usize;
            while let Some(current) = pending.pop() {
                let children = self.storage.list_children(&current).await?;
                pending.extend(
                    children
                        .iter()
                        .filter(|child| child.is_folder())
                        .map(|child| paths::join(&current, &child.name)),
                );
                self.storage.replace_children(&current, &[]).await?;
                cleared += 1;
            }
            tracing::debug!(path = %item.path, cleared, "descendant listings cleared");
        }

        if !self.storage.remove_item(&parent, item_id).await? {
            return Err(not_found(&parent, item_id));
        }
        tracing::info!(path = %item.path, id = item_id, "item deleted");
        Ok(())
    }

    pub async fn copy_item(
        &self,
        source_path: &str,
        target_path: &str,
        item_id: &str,
    ) -> Result<Item, FsError> {
        let source = paths::normalize(source_path);
        let target = paths::normalize(target_path);
        let listing = self.storage.list_children(&source).await?;
        let original = &listing[find_index(&listing, &source, item_id)?];
        let origin_path = paths::join(&source, &original.name);
        if original.is_folder() && paths::is_within(&target, &origin_path) {
            return Err(FsError::InvalidPath(format!(
                "cannot copy {origin_path:?} into itself"
            )));
        }

        let modified = today();
        let mut target_listing = self.storage.list_children(&target).await?;
        let name = copy_name(&original.name, &target_listing);
        let copy = duplicate(original, &target, name, modified);
        target_listing.push(copy.clone());
        self.storage
            .replace_children(&target, &target_listing)
            .await?;

        if copy.is_folder() {
            let mut pending = vec![(origin_path.clone(), copy.path.clone())];
            while let Some((from, to)) = pending.pop() {
                let children = self.storage.list_children(&from).await?;
                let mut batch: Vec<Item> = Vec::with_capacity(children.len());
                for child in &children {
                    let name = if batch.iter().any(|taken| taken.name == child.name) {
                        copy_name(&child.name, &batch)
                    } else {
                        child.name.clone()
                    };
                    let duplicated = duplicate(child, &to, name, modified);
                    if duplicated.is_folder() {
                        pending.push((paths::join(&from, &child.name), duplicated.path.clone()));
                    }
                    batch.push(duplicated);
                }
                self.storage.replace_children(&to, &batch).await?;
            }
        }

        tracing::info!(from = %origin_path, to = %copy.path, id = %copy.id, "item copied");
        Ok(copy)
    }

    pub async fn move_item(
        &self,
        source_path: &str,
        target_path: &str,
        item_id: &str,
    ) -> Result<Item, FsError> {
        let source = paths::normalize(source_path);
        let target = paths::normalize(target_path);
        let mut source_listing = self.storage.list_children(&source).await?;
        let index = find_index(&source_listing, &source, item_id)?;
        let old_path = paths::join(&source, &source_listing[index].name);
        if source_listing[index].is_folder() && paths::is_within(&target, &old_path) {
            return Err(FsError::InvalidPath(format!(
                "cannot move {old_path:?} into itself"
            )));
        }

        let mut target_listing = self.storage.list_children(&target).await?;
        let name = source_listing[index].name.clone();
        if target_listing.iter().any(|other| other.name == name) {
            return Err(already_exists(&target, &name));
        }

        let mut item = source_listing.remove(index);
        self.storage
            .replace_children(&source, &source_listing)
            .await?;

        item.path = paths::join(&target, &name);
        item.modified = today();
        target_listing.push(item.clone());
        self.storage
            .replace_children(&target, &target_listing)
            .await?;

        if item.is_folder() {
            self.rekey_subtree(&old_path, &item.path).await?;
        }
        tracing::info!(from = %old_path, to = %item.path, id = %item.id, "item moved");
        Ok(item)
    }

    /// Copy of the listing at `path`; empty for a path that was never written.
    pub async fn get_file_tree(&self, path: &str) -> Result<Vec<Item>, FsError> {
        Ok(self
            .storage
            .list_children(&paths::normalize(path))
            .await?)
    }

    /// Recursive snapshot of everything below `path`.
    pub async fn walk_tree(&self, path: &str) -> Result<Vec<TreeNode>, FsError> {
        let root = paths::normalize(path);
        let mut visited = HashSet::new();
        let mut listings = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let items = self.storage.list_children(&current).await?;
            pending.extend(
                items
                    .iter()
                    .filter(|item| item.is_folder())
                    .map(|item| paths::join(&current, &item.name)),
            );
            listings.push((current, items));
        }

        // Listings were discovered parents-first, so building in reverse
        // always finds a folder's children already assembled.
        let mut built: HashMap<String, Vec<TreeNode>> = HashMap::new();
        for (key, items) in listings.into_iter().rev() {
            let nodes = items
                .into_iter()
                .map(|item| {
                    let children = if item.is_folder() {
                        built
                            .remove(&paths::join(&key, &item.name))
                            .unwrap_or_default()
                    } else {
                        Vec::new()
                    };
                    TreeNode { item, children }
                })
                .collect();
            built.insert(key, nodes);
        }
        Ok(built.remove(&root).unwrap_or_default())
    }

    /// Looks an item up by its full path. The root itself is not an item.
    pub async fn resolve(&self, path: &str) -> Result<Option<Item>, FsError> {
        let path = paths::normalize(path);
        if path == paths::ROOT {
            return Ok(None);
        }
        let name = paths::base_name(&path);
        let listing = self.storage.list_children(&paths::parent(&path)).await?;
        Ok(listing.into_iter().find(|item| item.name == name))
    }

    async fn insert_new(&self, parent: &str, item: Item) -> Result<(), FsError> {
        let mut listing = self.storage.list_children(parent).await?;
        if listing.iter().any(|other| other.name == item.name) {
            return Err(already_exists(parent, &item.name));
        }
        listing.push(item);
        self.storage.replace_children(parent, &listing).await?;
        Ok(())
    }

    /// Moves every listing at or below `old_root` to the matching key below
    /// `new_root`, recomputing each item's path and leaving the old keys empty.
    async fn rekey_subtree(&self, old_root: &str, new_root: &str) -> Result<(), FsError> {
        let mut pending = vec![old_root.to_string()];
        let mut moved = 0usize;
        while let Some(from) = pending.pop() {
            let mut items = self.storage.list_children(&from).await?;
            let to = paths::rebase(&from, old_root, new_root);
            for item in &mut items {
                if item.is_folder() {
                    pending.push(paths::join(&from, &item.name));
                }
                item.path = paths::join(&to, &item.name);
            }
            self.storage.replace_children(&to, &items).await?;
            self.storage.replace_children(&from, &[]).await?;
            moved += 1;
        }
        tracing::debug!(from = old_root, to = new_root, listings = moved, "subtree re-keyed");
        Ok(())
    }
}

fn find_index(listing: &[Item], path: &str, item_id: &str) -> Result<usize, FsError> {
    listing
        .iter()
        .position(|item| item.id == item_id)
        .ok_or_else(|| not_found(path, item_id))
}

fn not_found(path: &str, item_id: &str) -> FsError {
    FsError::NotFound {
        path: path.to_string(),
        id: item_id.to_string(),
    }
}

fn already_exists(path: &str, name: &str) -> FsError {
    FsError::AlreadyExists {
        path: path.to_string(),
        name: name.to_string(),
    }
}

/// First free name among `"{name} (Copy)"`, `"{name} (Copy 1)"`, `"{name} (Copy 2)"`...
pub fn copy_name(name: &str, siblings: &[Item]) -> String {
    let taken = |candidate: &str| siblings.iter().any(|item| item.name == candidate);
    let first = format!("{name} (Copy)");
    if !taken(&first) {
        return first;
    }
    let mut counter: u64 = 1;
    loop {
        let candidate = format!("{name} (Copy {counter})");
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn duplicate(original: &Item, parent: &str, name: String, modified: Date) -> Item {
    Item {
        id: new_id(),
        path: paths::join(parent, &name),
        name,
        modified,
        icon: original.icon.clone(),
        kind: original.kind.clone(),
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
