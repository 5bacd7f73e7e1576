//! Request surface: validates raw input, runs the engine and reports
//! outcomes as status-coded result records.
//!
//! Reads and deletes go through the retry policy. Create, rename, copy and
//! move run once: they write several listings, and repeating one after a
//! partial write would act on the half-finished state.

use deskfs_core::Item;
use reqwest::StatusCode;
use serde::Serialize;

use crate::engine::{FileEngine, FsError, TreeNode};
use crate::paths;
use crate::retry::RetryPolicy;
use crate::validation::{validate_name, validate_target_path};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: OperationResult<T>,
}

impl<T> ApiResponse<T> {
    fn success(status: StatusCode, data: Option<T>) -> Self {
        Self {
            status: status.as_u16(),
            body: OperationResult {
                success: true,
                data,
                error: None,
            },
        }
    }

    fn failure(err: &FsError) -> Self {
        let status = status_for(err);
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %err, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %err, "request rejected");
        }
        Self {
            status: status.as_u16(),
            body: OperationResult {
                success: false,
                data: None,
                error: Some(err.to_string()),
            },
        }
    }

    fn from_result(status: StatusCode, result: Result<T, FsError>) -> Self {
        match result {
            Ok(data) => Self::success(status, Some(data)),
            Err(err) => Self::failure(&err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.body.success
    }
}

pub fn status_for(err: &FsError) -> StatusCode {
    match err {
        FsError::NotFound { .. } => StatusCode::NOT_FOUND,
        FsError::AlreadyExists { .. } => StatusCode::CONFLICT,
        FsError::InvalidName(_) | FsError::InvalidPath(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FsError::StorageUnavailable(_) | FsError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Clone)]
pub struct FileService {
    engine: FileEngine,
    retry: RetryPolicy,
}

impl FileService {
    pub fn new(engine: FileEngine, retry: RetryPolicy) -> Self {
        Self { engine, retry }
    }

    pub fn engine(&self) -> &FileEngine {
        &self.engine
    }

    pub async fn list(&self, path: &str) -> ApiResponse<Vec<Item>> {
        let result = match validate_target_path(path) {
            Ok(()) => {
                let engine = &self.engine;
                self.retry
                    .run("list", move || engine.get_file_tree(path))
                    .await
            }
            Err(err) => Err(err.into()),
        };
        ApiResponse::from_result(StatusCode::OK, result)
    }

    pub async fn tree(&self, path: &str) -> ApiResponse<Vec<TreeNode>> {
        let result = match validate_target_path(path) {
            Ok(()) => {
                let engine = &self.engine;
                self.retry
                    .run("tree", move || engine.walk_tree(path))
                    .await
            }
            Err(err) => Err(err.into()),
        };
        ApiResponse::from_result(StatusCode::OK, result)
    }

    pub async fn stat(&self, path: &str) -> ApiResponse<Item> {
        let result: Result<Item, FsError> = async {
            validate_target_path(path)?;
            let engine = &self.engine;
            self.retry
                .run("stat", move || engine.resolve(path))
                .await?
                .ok_or_else(|| {
                    let path = paths::normalize(path);
                    FsError::NotFound {
                        id: paths::base_name(&path).to_string(),
                        path: paths::parent(&path),
                    }
                })
        }
        .await;
        ApiResponse::from_result(StatusCode::OK, result)
    }

    pub async fn create_folder(&self, path: &str, name: &str) -> ApiResponse<Item> {
        let result: Result<Item, FsError> = async {
            validate_target_path(path)?;
            validate_name(name)?;
            self.engine.create_folder(path, name).await
        }
        .await;
        ApiResponse::from_result(StatusCode::CREATED, result)
    }

    pub async fn create_file(
        &self,
        path: &str,
        name: &str,
        content: Option<String>,
        size: u64,
    ) -> ApiResponse<Item> {
        let result: Result<Item, FsError> = async {
            validate_target_path(path)?;
            validate_name(name)?;
            self.engine.create_file(path, name, content, size).await
        }
        .await;
        ApiResponse::from_result(StatusCode::CREATED, result)
    }

    pub async fn rename(&self, path: &str, item_id: &str, new_name: &str) -> ApiResponse<Item> {
        let result: Result<Item, FsError> = async {
            validate_target_path(path)?;
            validate_name(new_name)?;
            self.engine.rename_item(path, item_id, new_name).await
        }
        .await;
        ApiResponse::from_result(StatusCode::OK, result)
    }

    pub async fn delete(&self, path: &str, item_id: &str) -> ApiResponse<()> {
        let result: Result<(), FsError> = async {
            validate_target_path(path)?;
            let engine = &self.engine;
            self.retry
                .run("delete", move || engine.delete_item(path, item_id))
                .await
        }
        .await;
        match result {
            Ok(()) => ApiResponse::success(StatusCode::OK, None),
            Err(err) => ApiResponse::failure(&err),
        }
    }

    pub async fn copy(&self, source: &str, target: &str, item_id: &str) -> ApiResponse<Item> {
        let result: Result<Item, FsError> = async {
            validate_target_path(source)?;
            validate_target_path(target)?;
            self.engine.copy_item(source, target, item_id).await
        }
        .await;
        ApiResponse::from_result(StatusCode::CREATED, result)
    }

    pub async fn move_item(&self, source: &str, target: &str, item_id: &str) -> ApiResponse<Item> {
        let result: Result<Item, FsError> = async {
            validate_target_path(source)?;
            validate_target_path(target)?;
            self.engine.move_item(source, target, item_id).await
        }
        .await;
        ApiResponse::from_result(StatusCode::OK, result)
    }
}
