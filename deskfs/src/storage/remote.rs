use async_trait::async_trait;
use deskfs_core::{ApiErrorClass, Item, ItemRow, TableClient, TableError};

use super::{FileStorage, StorageError, ensure_unique_names};

impl From<TableError> for StorageError {
    fn from(err: TableError) -> Self {
        if err.is_retryable() {
            StorageError::Unavailable(err.to_string())
        } else {
            StorageError::Backend(err.to_string())
        }
    }
}

/// Like the `From` conversion, but a constraint conflict becomes a duplicate
/// name inside the listing at `path`.
fn listing_error(path: &str, err: TableError) -> StorageError {
    if err.classification() == Some(ApiErrorClass::Conflict) {
        if let TableError::Api { body, .. } = &err {
            return StorageError::DuplicateName {
                path: path.to_string(),
                name: conflicting_name(body).unwrap_or_else(|| body.trim().to_string()),
            };
        }
    }
    err.into()
}

/// Last key value in a unique violation's details, e.g. `a.txt` from
/// `Key (tenant_id, parent_path, name)=(acme, Docs, a.txt) already exists.`
fn conflicting_name(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let details = value.get("details")?.as_str()?;
    let (_, values) = details.split_once(")=(")?;
    let (values, _) = values.rsplit_once(')')?;
    let name = values.rsplit(", ").next()?;
    Some(name.to_string())
}

/// Durable listing storage in a remote table, one row per item.
///
/// Every request carries the tenant this handle was built for.
#[derive(Clone)]
pub struct RemoteStorage {
    client: TableClient,
    tenant: String,
}

impl RemoteStorage {
    pub fn new(client: TableClient, tenant: impl Into<String>) -> Self {
        Self {
            client,
            tenant: tenant.into(),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Server-side prefix rewrite of every listing at or below `old_prefix`.
    pub async fn rewrite_prefix(
        &self,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<u64, StorageError> {
        if old_prefix.is_empty() || new_prefix.is_empty() {
            return Err(StorageError::Backend(
                "cannot rewrite to or from the root listing".to_string(),
            ));
        }
        Ok(self
            .client
            .rewrite_prefix(&self.tenant, old_prefix, new_prefix)
            .await?)
    }

    /// Server-side removal of every listing at or below `prefix`.
    pub async fn delete_subtree(&self, prefix: &str) -> Result<u64, StorageError> {
        Ok(self.client.delete_subtree(&self.tenant, prefix).await?)
    }
}

#[async_trait]
impl FileStorage for RemoteStorage {
    async fn list_children(&self, path: &str) -> Result<Vec<Item>, StorageError> {
        let rows = self.client.select_children(&self.tenant, path).await?;
        Ok(rows.into_iter().map(ItemRow::into_item).collect())
    }

    async fn replace_children(&self, path: &str, items: &[Item]) -> Result<(), StorageError> {
        ensure_unique_names(path, items)?;

        let keep: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        self.client
            .delete_children_except(&self.tenant, path, &keep)
            .await
            .map_err(|err| listing_error(path, err))?;

        let rows: Vec<ItemRow> = items
            .iter()
            .enumerate()
            .map(|(position, item)| ItemRow::from_item(&self.tenant, path, position, item))
            .collect();
        self.client
            .upsert_rows(&rows)
            .await
            .map_err(|err| listing_error(path, err))?;
        tracing::debug!(path, count = rows.len(), tenant = %self.tenant, "remote listing replaced");
        Ok(())
    }

    async fn remove_item(&self, path: &str, item_id: &str) -> Result<bool, StorageError> {
        Ok(self.client.delete_row(&self.tenant, path, item_id).await?)
    }
}
