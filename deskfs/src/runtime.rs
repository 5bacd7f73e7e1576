use std::sync::Arc;

use anyhow::Context;
use deskfs_core::TableClient;

use crate::config::{AppConfig, BackendKind};
use crate::engine::FileEngine;
use crate::service::FileService;
use crate::storage::{FileStorage, MemoryStorage, RemoteStorage, SqliteStorage};

/// Builds the configured storage backend.
pub async fn open_storage(config: &AppConfig) -> anyhow::Result<Arc<dyn FileStorage>> {
    let storage: Arc<dyn FileStorage> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryStorage::new()),
        BackendKind::Sqlite => {
            let storage = SqliteStorage::open(&config.db_path, config.tenant.clone())
                .await
                .with_context(|| format!("failed to open database at {:?}", config.db_path))?;
            Arc::new(storage)
        }
        BackendKind::Remote => {
            let remote = config
                .remote
                .as_ref()
                .context("remote backend is not configured")?;
            let client = TableClient::new(&remote.url, &remote.api_key)
                .context("failed to build remote table client")?
                .with_table(remote.table.clone());
            Arc::new(RemoteStorage::new(client, config.tenant.clone()))
        }
    };
    tracing::debug!(backend = ?config.backend, tenant = %config.tenant, "storage ready");
    Ok(storage)
}

pub async fn bootstrap(config: &AppConfig) -> anyhow::Result<FileService> {
    let storage = open_storage(config).await?;
    Ok(FileService::new(
        FileEngine::new(storage),
        config.retry_policy(),
    ))
}
