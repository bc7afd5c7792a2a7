use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::Report;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact is unreadable: {0}")]
    Corrupt(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Photo error: {0}")]
    Photo(String),

    #[error("Unsupported by this store: {0}")]
    Unsupported(&'static str),
}

impl StoreError {
    /// Local I/O and workbook failures are reported generically; remote and
    /// photo failures carry their message to the client.
    pub fn is_remote(&self) -> bool {
        matches!(self, StoreError::Remote(_) | StoreError::Photo(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Snapshot of the artifact as it is on the backing medium right now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDescription {
    pub exists: bool,
    pub path: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

/// Owner of the single append-only tabular artifact.
///
/// Mutating calls (`ensure_exists`, `append_rows`, `reset`) must only be
/// issued through the `WriteSerializer`; `describe` and `read_artifact` are
/// safe to call at any time.
#[async_trait]
pub trait SpreadsheetStore: Send + Sync {
    async fn ensure_exists(&self) -> Result<()>;
    async fn append_rows(&self, rows: &[Report]) -> Result<()>;
    async fn describe(&self) -> Result<StoreDescription>;
    async fn reset(&self) -> Result<()>;
    async fn read_artifact(&self) -> Result<Option<Vec<u8>>>;
    fn artifact_name(&self) -> &str;
    fn backend(&self) -> &'static str;
}
