//! Google Sheets sink with Drive-hosted photos.
//!
//! Token minting is out of scope here: callers hand in an already issued
//! OAuth bearer token with the spreadsheets and drive scopes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::store::{Result, SpreadsheetStore, StoreDescription, StoreError};
use crate::{PhotoData, Report, HEADERS, PHOTO_HEADER};

pub const SHEETS_API: &str = "https://sheets.googleapis.com";
pub const DRIVE_API: &str = "https://www.googleapis.com";

/// Blob store that turns an inline photo into a durable, directly viewable URL.
#[async_trait]
pub trait PhotoUploader: Send + Sync {
    async fn upload(&self, file_name: &str, photo: &PhotoData) -> Result<String>;
}

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

pub struct DriveUploader {
    client: reqwest::Client,
    token: String,
    folder_id: String,
    base_url: String,
}

impl DriveUploader {
    pub fn new(client: reqwest::Client, token: String, folder_id: String) -> Self {
        Self {
            client,
            token,
            folder_id,
            base_url: DRIVE_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PhotoUploader for DriveUploader {
    async fn upload(&self, file_name: &str, photo: &PhotoData) -> Result<String> {
        let bytes = photo.decode()?;
        let boundary = format!("report-{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({ "name": file_name, "parents": [self.folder_id] });
        let body = multipart_related(&boundary, &metadata, &photo.mime, &bytes);

        let url = format!("{}/upload/drive/v3/files", self.base_url);
        let created: CreatedFile = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(remote_err)?
            .error_for_status()
            .map_err(remote_err)?
            .json()
            .await
            .map_err(remote_err)?;

        // anyone with the link can view, so the sheet cell renders it
        let url = format!("{}/drive/v3/files/{}/permissions", self.base_url, created.id);
        self.client
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .map_err(remote_err)?
            .error_for_status()
            .map_err(remote_err)?;

        info!(file_id = %created.id, name = %file_name, "photo uploaded");
        Ok(direct_view_url(&created.id))
    }
}

pub struct SheetsStore {
    client: reqwest::Client,
    token: String,
    sheet_id: String,
    tab: String,
    uploader: Arc<dyn PhotoUploader>,
    base_url: String,
}

impl SheetsStore {
    pub fn new(
        client: reqwest::Client,
        token: String,
        sheet_id: String,
        tab: String,
        uploader: Arc<dyn PhotoUploader>,
    ) -> Self {
        Self {
            client,
            token,
            sheet_id,
            tab,
            uploader,
            base_url: SHEETS_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            self.sheet_id,
            urlencoding::encode(range)
        )
    }

    async fn append_values(&self, values: Vec<Vec<String>>) -> Result<()> {
        let url = format!("{}:append", self.values_url(&format!("{}!A:Z", self.tab)));
        self.client
            .post(url)
            .bearer_auth(&self.token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": values }))
            .send()
            .await
            .map_err(remote_err)?
            .error_for_status()
            .map_err(remote_err)?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[async_trait]
impl SpreadsheetStore for SheetsStore {
    async fn ensure_exists(&self) -> Result<()> {
        let header: ValueRange = self
            .client
            .get(self.values_url(&format!("{}!A1:J1", self.tab)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(remote_err)?
            .error_for_status()
            .map_err(remote_err)?
            .json()
            .await
            .map_err(remote_err)?;

        if header.values.is_empty() {
            self.append_values(vec![header_row()]).await?;
            info!(sheet_id = %self.sheet_id, tab = %self.tab, "header row written");
        }
        Ok(())
    }

    async fn append_rows(&self, rows: &[Report]) -> Result<()> {
        let mut values = Vec::with_capacity(rows.len());
        for report in rows {
            let photo_url = match &report.photo {
                Some(photo) => {
                    let name = format!("reporte_{}.{}", report.id, photo.extension());
                    self.uploader.upload(&name, photo).await?
                }
                None => String::new(),
            };
            values.push(row_values(report, photo_url));
        }

        let count = values.len();
        self.append_values(values).await?;
        debug!(sheet_id = %self.sheet_id, appended = count, "rows appended");
        Ok(())
    }

    async fn describe(&self) -> Result<StoreDescription> {
        let url = format!("{}/v4/spreadsheets/{}", self.base_url, self.sheet_id);
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("fields", "spreadsheetId")])
            .send()
            .await
            .map_err(remote_err)?;

        let exists = match resp.status() {
            s if s.is_success() => true,
            reqwest::StatusCode::NOT_FOUND => false,
            s => return Err(StoreError::Remote(format!("spreadsheet lookup: HTTP {s}"))),
        };

        Ok(StoreDescription {
            exists,
            path: format!("sheets:{}/{}", self.sheet_id, self.tab),
            last_modified: None,
            size_bytes: 0,
        })
    }

    async fn reset(&self) -> Result<()> {
        Err(StoreError::Unsupported("reset of a remote sheet"))
    }

    async fn read_artifact(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn artifact_name(&self) -> &str {
        &self.tab
    }

    fn backend(&self) -> &'static str {
        "sheets"
    }
}

pub fn direct_view_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?export=view&id={file_id}")
}

fn header_row() -> Vec<String> {
    HEADERS
        .iter()
        .chain(std::iter::once(&PHOTO_HEADER))
        .map(|h| h.to_string())
        .collect()
}

fn row_values(report: &Report, photo_url: String) -> Vec<String> {
    let mut row: Vec<String> = report.to_row().iter().map(|v| v.to_string()).collect();
    row.push(photo_url);
    row
}

fn multipart_related(
    boundary: &str,
    metadata: &serde_json::Value,
    mime: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {mime}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn remote_err(e: reqwest::Error) -> StoreError {
    StoreError::Remote(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_rows_carry_photo_link_last() {
        let report = Report {
            id: "7".into(),
            timestamp: "2024-01-01 08:00".into(),
            shift: "AM".into(),
            report_type: "Falla".into(),
            equipment: "Bomba1".into(),
            description: "Fuga".into(),
            operator: "Ana".into(),
            area: "Planta".into(),
            sync_status: "synced".into(),
            photo: None,
        };
        let row = row_values(&report, direct_view_url("abc"));
        assert_eq!(row.len(), 10);
        assert_eq!(row[0], "7");
        assert_eq!(row[9], "https://drive.google.com/uc?export=view&id=abc");
        assert_eq!(header_row().last().map(String::as_str), Some("Foto"));
    }

    #[test]
    fn multipart_body_has_both_parts() {
        let body = multipart_related("b1", &json!({"name": "x.png"}), "image/png", b"PNG");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--b1\r\nContent-Type: application/json"));
        assert!(text.contains("{\"name\":\"x.png\"}"));
        assert!(text.contains("Content-Type: image/png\r\n\r\nPNG\r\n--b1--"));
    }

    #[test]
    fn values_range_is_url_encoded() {
        struct Never;
        #[async_trait]
        impl PhotoUploader for Never {
            async fn upload(&self, _: &str, _: &PhotoData) -> Result<String> {
                unreachable!()
            }
        }
        let store = SheetsStore::new(
            reqwest::Client::new(),
            "t".into(),
            "sheet123".into(),
            "Hoja 1".into(),
            Arc::new(Never),
        )
        .with_base_url("http://localhost:1");
        assert_eq!(
            store.values_url("Hoja 1!A:Z"),
            "http://localhost:1/v4/spreadsheets/sheet123/values/Hoja%201%21A%3AZ"
        );
    }
}
