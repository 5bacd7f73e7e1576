use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};

use crate::retry::RetryPolicy;

const DEFAULT_TENANT: &str = "default";
const DEFAULT_TABLE: &str = "fs_items";
const DEFAULT_RETRY_ATTEMPTS: u64 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 100;
const DEFAULT_RETRY_MAX_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Sqlite,
    Remote,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "sqlite" => Ok(BackendKind::Sqlite),
            "remote" => Ok(BackendKind::Remote),
            other => bail!("unknown storage backend {other:?} (expected memory, sqlite or remote)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendKind,
    pub db_path: PathBuf,
    pub remote: Option<RemoteConfig>,
    pub tenant: String,
    pub retry_attempts: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let backend = match lookup("DESKFS_BACKEND") {
            Some(value) => value.parse().context("invalid DESKFS_BACKEND")?,
            None => BackendKind::Sqlite,
        };

        let db_path = match lookup("DESKFS_DB_PATH") {
            Some(value) if value.starts_with('~') => {
                let home = dirs::home_dir().context("home directory is unavailable")?;
                expand_with_home(&value, &home)
            }
            Some(value) => PathBuf::from(value),
            None => default_db_path(),
        };

        let remote = match (lookup("DESKFS_REMOTE_URL"), lookup("DESKFS_REMOTE_KEY")) {
            (Some(url), Some(api_key)) => Some(RemoteConfig {
                url,
                api_key,
                table: lookup("DESKFS_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            }),
            _ => None,
        };
        if backend == BackendKind::Remote && remote.is_none() {
            bail!("remote backend requires DESKFS_REMOTE_URL and DESKFS_REMOTE_KEY");
        }

        let tenant = lookup("DESKFS_TENANT")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TENANT.to_string());
        let retry_attempts = read_u64(&lookup, "DESKFS_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS);
        let retry_base = read_u64(&lookup, "DESKFS_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS);
        let retry_max = read_u64(&lookup, "DESKFS_RETRY_MAX_MS", DEFAULT_RETRY_MAX_MS);

        Ok(Self {
            backend,
            db_path,
            remote,
            tenant,
            retry_attempts: u32::try_from(retry_attempts).unwrap_or(u32::MAX),
            retry_base: Duration::from_millis(retry_base),
            retry_max: Duration::from_millis(retry_max.max(retry_base)),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_base, self.retry_max, self.retry_attempts)
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("deskfs")
        .join("fs.db")
}

fn read_u64(lookup: impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    lookup(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
