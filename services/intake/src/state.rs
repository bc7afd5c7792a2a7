use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reportstore::{
    DriveUploader, ReportIntake, SheetsStore, SpreadsheetStore, WriteSerializer, XlsxStore,
};

use crate::config::{AppConfig, StoreBackend};

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
pub struct AppState {
    pub intake: ReportIntake,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the configured store and starts its write queue.
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = build_store(&config.backend, config.write_timeout)?;
        let writer = WriteSerializer::start(config.write_timeout);
        let intake = ReportIntake::new(store, writer, config.sync_status.clone());
        Ok(Self { intake, config })
    }

    pub fn store(&self) -> &dyn SpreadsheetStore {
        self.intake.store().as_ref()
    }
}

fn build_store(
    backend: &StoreBackend,
    request_timeout: Duration,
) -> Result<Arc<dyn SpreadsheetStore>> {
    let store: Arc<dyn SpreadsheetStore> = match backend {
        StoreBackend::Xlsx {
            data_dir,
            artifact_name,
        } => Arc::new(XlsxStore::new(data_dir.clone(), artifact_name.clone())),
        StoreBackend::Sheets {
            sheet_id,
            sheet_tab,
            drive_folder_id,
            access_token,
        } => {
            // a hung Google call must fail the task, not stall the write queue
            let client = reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .context("Failed to build HTTP client")?;
            let uploader = DriveUploader::new(
                client.clone(),
                access_token.clone(),
                drive_folder_id.clone(),
            );
            Arc::new(SheetsStore::new(
                client,
                access_token.clone(),
                sheet_id.clone(),
                sheet_tab.clone(),
                Arc::new(uploader),
            ))
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sheets_backend_is_selected_from_config() {
        let mut config = AppConfig::local("unused");
        config.backend = StoreBackend::Sheets {
            sheet_id: "sheet".into(),
            sheet_tab: "Hoja 1".into(),
            drive_folder_id: "folder".into(),
            access_token: "token".into(),
        };
        config.write_timeout = Duration::from_secs(5);

        let state = AppState::new(config).unwrap();
        assert_eq!(state.store().backend(), "sheets");
        assert_eq!(state.store().artifact_name(), "Hoja 1");
    }
}
