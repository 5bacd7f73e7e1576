use std::path::Path;

use async_trait::async_trait;
use deskfs_core::{Item, ItemKind, ItemType};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool, migrate::Migrator};
use time::Date;

use super::{FileStorage, StorageError, ensure_unique_names};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        let transient = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => true,
            // SQLITE_BUSY, SQLITE_LOCKED
            sqlx::Error::Database(db) => db.code().is_some_and(|code| matches!(&*code, "5" | "6")),
            _ => false,
        };
        if transient {
            StorageError::Unavailable(err.to_string())
        } else {
            StorageError::Backend(err.to_string())
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StorageError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StorageError::Backend(format!("migration error: {err}"))
    }
}

/// Durable listing storage in a local SQLite database.
///
/// Rows live in `fs_items`, keyed by `(tenant_id, parent_path, id)`; every
/// query is scoped to the tenant this handle was built for.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    tenant: String,
}

impl SqliteStorage {
    pub fn from_pool(pool: SqlitePool, tenant: impl Into<String>) -> Self {
        Self {
            pool,
            tenant: tenant.into(),
        }
    }

    pub async fn new(database_url: &str, tenant: impl Into<String>) -> Result<Self, StorageError> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self::from_pool(pool, tenant);
        store.init().await?;
        Ok(store)
    }

    pub async fn open(db_path: &Path, tenant: impl Into<String>) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                StorageError::Backend(format!("cannot create {}: {err}", parent.display()))
            })?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self::from_pool(pool, tenant);
        store.init().await?;
        Ok(store)
    }

    pub async fn init(&self) -> Result<(), StorageError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Another handle on the same database, scoped to `tenant`.
    pub fn for_tenant(&self, tenant: impl Into<String>) -> Self {
        Self::from_pool(self.pool.clone(), tenant)
    }

    /// Rewrites every listing at or below `old_prefix` so it lives under
    /// `new_prefix`, in a single statement. Returns the number of rows moved.
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
        let result = sqlx::query(
            "UPDATE fs_items
             SET parent_path = ?3 || substr(parent_path, length(?2) + 1),
                 path = ?3 || substr(path, length(?2) + 1)
             WHERE tenant_id = ?1
                AND (parent_path = ?2 OR substr(parent_path, 1, length(?2) + 1) = ?2 || '/')",
        )
        .bind(&self.tenant)
        .bind(old_prefix)
        .bind(new_prefix)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Drops every listing at or below `prefix`. Returns the number of rows removed.
    pub async fn delete_subtree(&self, prefix: &str) -> Result<u64, StorageError> {
        let result = if prefix.is_empty() {
            sqlx::query("DELETE FROM fs_items WHERE tenant_id = ?1")
                .bind(&self.tenant)
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query(
                "DELETE FROM fs_items
                 WHERE tenant_id = ?1
                    AND (parent_path = ?2 OR substr(parent_path, 1, length(?2) + 1) = ?2 || '/')",
            )
            .bind(&self.tenant)
            .bind(prefix)
            .execute(&self.pool)
            .await?
        };
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FileStorage for SqliteStorage {
    async fn list_children(&self, path: &str) -> Result<Vec<Item>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, name, item_type, path, modified, icon, size, content
             FROM fs_items
             WHERE tenant_id = ?1 AND parent_path = ?2
             ORDER BY position ASC",
        )
        .bind(&self.tenant)
        .bind(path)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    async fn replace_children(&self, path: &str, items: &[Item]) -> Result<(), StorageError> {
        ensure_unique_names(path, items)?;
        let sizes = items
            .iter()
            .map(stored_size)
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM fs_items WHERE tenant_id = ?1 AND parent_path = ?2")
            .bind(&self.tenant)
            .bind(path)
            .execute(&mut *tx)
            .await?;

        for (position, (item, size)) in items.iter().zip(sizes).enumerate() {
            let content = match &item.kind {
                ItemKind::File { content, .. } => content.as_deref(),
                ItemKind::Folder => None,
            };
            sqlx::query(
                "INSERT INTO fs_items (
                    tenant_id, parent_path, id, position, name, item_type, path, modified, icon, size, content
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )
            .bind(&self.tenant)
            .bind(path)
            .bind(&item.id)
            .bind(position as i64)
            .bind(&item.name)
            .bind(item.item_type().as_str())
            .bind(&item.path)
            .bind(item.modified.to_julian_day())
            .bind(&item.icon)
            .bind(size)
            .bind(content)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(path, count = items.len(), tenant = %self.tenant, "sqlite listing replaced");
        Ok(())
    }

    async fn remove_item(&self, path: &str, item_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "DELETE FROM fs_items WHERE tenant_id = ?1 AND parent_path = ?2 AND id = ?3",
        )
        .bind(&self.tenant)
        .bind(path)
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// SQLite integers are signed; sizes past `i64::MAX` are refused rather than wrapped.
fn stored_size(item: &Item) -> Result<Option<i64>, StorageError> {
    match &item.kind {
        ItemKind::File { size, .. } => i64::try_from(*size).map(Some).map_err(|_| {
            StorageError::Backend(format!("size {size} of {:?} is too large to store", item.path))
        }),
        ItemKind::Folder => Ok(None),
    }
}

fn item_from_row(row: &SqliteRow) -> Result<Item, StorageError> {
    let item_type: String = row.try_get("item_type")?;
    let item_type = ItemType::parse(&item_type)
        .ok_or_else(|| StorageError::Backend(format!("invalid item type: {item_type}")))?;
    let julian_day: i32 = row.try_get("modified")?;
    let modified = Date::from_julian_day(julian_day)
        .map_err(|err| StorageError::Backend(format!("invalid modified date: {err}")))?;
    let kind = match item_type {
        ItemType::File => {
            let size: Option<i64> = row.try_get("size")?;
            ItemKind::File {
                size: size.unwrap_or(0).max(0) as u64,
                content: row.try_get("content")?,
            }
        }
        ItemType::Folder => ItemKind::Folder,
    };

    Ok(Item {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        path: row.try_get("path")?,
        modified,
        icon: row.try_get("icon")?,
        kind,
    })
}
