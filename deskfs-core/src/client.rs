use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;
use url::Url;

use crate::item::{Item, ItemKind, ItemType, icon_for};

const DEFAULT_TABLE: &str = "fs_items";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    /// A constraint on the table rejected the write.
    Conflict,
    Permanent,
}

/// One row of the remote listing table, keyed by `(tenant_id, parent_path, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRow {
    pub tenant_id: String,
    pub parent_path: String,
    pub id: String,
    pub position: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub path: String,
    #[serde(with = "crate::date_format")]
    pub modified: Date,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ItemRow {
    pub fn from_item(tenant_id: &str, parent_path: &str, position: usize, item: &Item) -> Self {
        let (size, content) = match &item.kind {
            ItemKind::File { size, content } => (Some(*size), content.clone()),
            ItemKind::Folder => (None, None),
        };
        Self {
            tenant_id: tenant_id.to_string(),
            parent_path: parent_path.to_string(),
            id: item.id.clone(),
            position: position as i64,
            name: item.name.clone(),
            item_type: item.item_type(),
            path: item.path.clone(),
            modified: item.modified,
            icon: Some(item.icon.clone()),
            size,
            content,
        }
    }

    pub fn into_item(self) -> Item {
        let icon = self
            .icon
            .unwrap_or_else(|| icon_for(&self.name, self.item_type).to_string());
        let kind = match self.item_type {
            ItemType::File => ItemKind::File {
                size: self.size.unwrap_or(0),
                content: self.content,
            },
            ItemType::Folder => ItemKind::Folder,
        };
        Item {
            id: self.id,
            name: self.name,
            path: self.path,
            modified: self.modified,
            icon,
            kind,
        }
    }
}

#[derive(Debug, Serialize)]
struct RewritePrefixArgs<'a> {
    p_tenant_id: &'a str,
    p_old_prefix: &'a str,
    p_new_prefix: &'a str,
}

#[derive(Debug, Serialize)]
struct DeleteSubtreeArgs<'a> {
    p_tenant_id: &'a str,
    p_prefix: &'a str,
}

/// Client for a PostgREST-style table holding directory listings.
#[derive(Clone)]
pub struct TableClient {
    http: Client,
    base_url: Url,
    api_key: String,
    table: String,
}

impl TableClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, TableError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            api_key: api_key.into(),
            table: DEFAULT_TABLE.to_string(),
        })
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub async fn select_children(
        &self,
        tenant_id: &str,
        parent_path: &str,
    ) -> Result<Vec<ItemRow>, TableError> {
        let mut url = self.table_endpoint()?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("tenant_id", &format!("eq.{tenant_id}"))
            .append_pair("parent_path", &format!("eq.{parent_path}"))
            .append_pair("order", "position.asc");
        let response = self
            .http
            .get(url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn upsert_rows(&self, rows: &[ItemRow]) -> Result<(), TableError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut url = self.table_endpoint()?;
        url.query_pairs_mut()
            .append_pair("on_conflict", "tenant_id,parent_path,id");
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.auth_header_value())
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;
        Self::handle_empty_response(response).await
    }

    /// Deletes every row of one listing except the ids in `keep_ids`.
    pub async fn delete_children_except(
        &self,
        tenant_id: &str,
        parent_path: &str,
        keep_ids: &[&str],
    ) -> Result<(), TableError> {
        let mut url = self.table_endpoint()?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("tenant_id", &format!("eq.{tenant_id}"))
                .append_pair("parent_path", &format!("eq.{parent_path}"));
            if !keep_ids.is_empty() {
                query.append_pair("id", &format!("not.in.({})", quote_list(keep_ids)));
            }
        }
        let response = self
            .http
            .delete(url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.auth_header_value())
            .header("Prefer", "return=minimal")
            .send()
            .await?;
        Self::handle_empty_response(response).await
    }

    pub async fn delete_row(
        &self,
        tenant_id: &str,
        parent_path: &str,
        id: &str,
    ) -> Result<bool, TableError> {
        let mut url = self.table_endpoint()?;
        url.query_pairs_mut()
            .append_pair("tenant_id", &format!("eq.{tenant_id}"))
            .append_pair("parent_path", &format!("eq.{parent_path}"))
            .append_pair("id", &format!("eq.{id}"));
        let response = self
            .http
            .delete(url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.auth_header_value())
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let deleted: Vec<ItemRow> = Self::handle_response(response).await?;
        Ok(!deleted.is_empty())
    }

    /// Server-side prefix rewrite of every listing at or below `old_prefix`.
    pub async fn rewrite_prefix(
        &self,
        tenant_id: &str,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<u64, TableError> {
        let url = self.endpoint("rest/v1/rpc/rewrite_path_prefix")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.auth_header_value())
            .json(&RewritePrefixArgs {
                p_tenant_id: tenant_id,
                p_old_prefix: old_prefix,
                p_new_prefix: new_prefix,
            })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Server-side removal of every listing at or below `prefix`.
    pub async fn delete_subtree(&self, tenant_id: &str, prefix: &str) -> Result<u64, TableError> {
        let url = self.endpoint("rest/v1/rpc/delete_subtree")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.auth_header_value())
            .json(&DeleteSubtreeArgs {
                p_tenant_id: tenant_id,
                p_prefix: prefix,
            })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn table_endpoint(&self) -> Result<Url, TableError> {
        self.endpoint(&format!("rest/v1/{}", self.table))
    }

    fn endpoint(&self, path: &str) -> Result<Url, TableError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TableError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(TableError::Api { status, body })
        }
    }

    async fn handle_empty_response(response: reqwest::Response) -> Result<(), TableError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(TableError::Api { status, body })
        }
    }
}

fn quote_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|value| format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",")
}

impl TableError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            TableError::Api { status, .. } => Some(classify_api_status(*status)),
            TableError::Request(err) if err.is_timeout() || err.is_connect() => {
                Some(ApiErrorClass::Transient)
            }
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status == StatusCode::CONFLICT {
        ApiErrorClass::Conflict
    } else if status.is_server_error()
        || matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_EARLY)
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_ids_for_in_filter() {
        assert_eq!(quote_list(&["a", "b\"c"]), "\"a\",\"b\\\"c\"");
    }

    #[test]
    fn classifies_statuses() {
        assert_eq!(
            classify_api_status(StatusCode::UNAUTHORIZED),
            ApiErrorClass::Auth
        );
        assert_eq!(
            classify_api_status(StatusCode::TOO_MANY_REQUESTS),
            ApiErrorClass::RateLimit
        );
        assert_eq!(
            classify_api_status(StatusCode::SERVICE_UNAVAILABLE),
            ApiErrorClass::Transient
        );
        assert_eq!(
            classify_api_status(StatusCode::CONFLICT),
            ApiErrorClass::Conflict
        );
        assert_eq!(
            classify_api_status(StatusCode::BAD_REQUEST),
            ApiErrorClass::Permanent
        );
    }
}
