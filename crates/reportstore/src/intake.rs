use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::validator::{validate_batch, RejectedItem};
use crate::{SpreadsheetStore, SyncStatusPolicy, WriteError, WriteSerializer};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("request body must be a report object or a non-empty array of reports")]
    InvalidBody,

    #[error("no valid reports in request")]
    NoValidReports { rejected: Vec<RejectedItem> },

    #[error(transparent)]
    Write(#[from] WriteError),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeReceipt {
    pub batch_id: Uuid,
    pub accepted: usize,
    pub rejected: Vec<RejectedItem>,
}

/// Validates submitted batches and funnels every store mutation through one
/// `WriteSerializer`.
#[derive(Clone)]
pub struct ReportIntake {
    store: Arc<dyn SpreadsheetStore>,
    writer: WriteSerializer,
    policy: SyncStatusPolicy,
}

impl ReportIntake {
    pub fn new(
        store: Arc<dyn SpreadsheetStore>,
        writer: WriteSerializer,
        policy: SyncStatusPolicy,
    ) -> Self {
        Self {
            store,
            writer,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn SpreadsheetStore> {
        &self.store
    }

    /// Resolves only after the accepted rows are on the backing medium.
    pub async fn submit(&self, raw: Value) -> Result<IntakeReceipt, IntakeError> {
        let items = match raw {
            Value::Array(items) if !items.is_empty() => items,
            obj @ Value::Object(_) => vec![obj],
            _ => return Err(IntakeError::InvalidBody),
        };

        let batch = validate_batch(&items, &self.policy);
        if batch.accepted.is_empty() {
            return Err(IntakeError::NoValidReports {
                rejected: batch.rejected,
            });
        }

        let batch_id = Uuid::new_v4();
        let accepted = batch.accepted.len();
        let store = self.store.clone();
        let rows = batch.accepted;

        self.writer
            .enqueue(
                async move {
                    store.ensure_exists().await?;
                    store.append_rows(&rows).await
                }
                .instrument(info_span!("append", %batch_id)),
            )
            .await?;

        info!(%batch_id, accepted, rejected = batch.rejected.len(), "reports stored");
        Ok(IntakeReceipt {
            batch_id,
            accepted,
            rejected: batch.rejected,
        })
    }

    /// Idempotent artifact creation, serialized with appends.
    pub async fn create_artifact(&self) -> Result<(), WriteError> {
        let store = self.store.clone();
        self.writer
            .enqueue(async move { store.ensure_exists().await })
            .await
    }

    /// Deletes and recreates the artifact. Irreversible.
    pub async fn reset_artifact(&self) -> Result<(), WriteError> {
        let store = self.store.clone();
        self.writer.enqueue(async move { store.reset().await }).await
    }
}
