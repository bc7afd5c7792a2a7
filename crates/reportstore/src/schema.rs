use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Sheet that holds every report row.
pub const SHEET_NAME: &str = "Reportes";

/// Fixed column layout. Order is significant and never rewritten once the
/// artifact exists.
pub const HEADERS: [&str; 9] = [
    "ID",
    "Fecha",
    "Turno",
    "Tipo",
    "Equipo",
    "Descripción",
    "Operador",
    "Área",
    "SyncStatus",
];

/// Longest text a single spreadsheet cell can hold, in characters.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Extra column used by the remote sheet for the uploaded photo link.
pub const PHOTO_HEADER: &str = "Foto";

/// One validated inspection/incident record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub timestamp: String,
    pub shift: String,
    pub report_type: String,
    pub equipment: String,
    pub description: String,
    pub operator: String,
    pub area: String,
    pub sync_status: String,
    #[serde(skip)]
    pub photo: Option<PhotoData>,
}

impl Report {
    /// Row values in `HEADERS` order.
    pub fn to_row(&self) -> [&str; 9] {
        [
            &self.id,
            &self.timestamp,
            &self.shift,
            &self.report_type,
            &self.equipment,
            &self.description,
            &self.operator,
            &self.area,
            &self.sync_status,
        ]
    }
}

/// Image carried inline as `data:image/<subtype>;base64,<payload>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhotoData {
    pub mime: String,
    payload: String,
}

impl PhotoData {
    /// Shape check only; the payload is decoded lazily by `decode`.
    pub fn parse(data_url: &str) -> Option<Self> {
        let rest = data_url.strip_prefix("data:image/")?;
        let (subtype, payload) = rest.split_once(";base64,")?;

        let subtype_ok = !subtype.is_empty()
            && subtype.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !subtype_ok || payload.is_empty() || payload.contains('\n') {
            return None;
        }

        Some(Self {
            mime: format!("image/{subtype}"),
            payload: payload.to_string(),
        })
    }

    pub fn extension(&self) -> &str {
        match self.mime.trim_start_matches("image/") {
            "jpeg" => "jpg",
            other => other,
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, StoreError> {
        base64::engine::general_purpose::STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| StoreError::Photo(format!("invalid base64 payload: {e}")))
    }
}

/// How the persisted `SyncStatus` column is derived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncStatusPolicy {
    /// Always store this value, ignoring what the client sent.
    Forced(String),
    /// Keep a non-empty client value, otherwise store this one.
    PreserveOrDefault(String),
}

impl SyncStatusPolicy {
    pub fn resolve(&self, client_value: &str) -> String {
        match self {
            SyncStatusPolicy::Forced(v) => v.clone(),
            SyncStatusPolicy::PreserveOrDefault(v) if client_value.is_empty() => v.clone(),
            SyncStatusPolicy::PreserveOrDefault(_) => client_value.to_string(),
        }
    }
}

impl Default for SyncStatusPolicy {
    fn default() -> Self {
        SyncStatusPolicy::Forced("synced".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_png_data_url() {
        let photo = PhotoData::parse("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(photo.mime, "image/png");
        assert_eq!(photo.extension(), "png");
        assert_eq!(photo.decode().unwrap(), b"hello");
    }

    #[test]
    fn jpeg_maps_to_jpg_extension() {
        let photo = PhotoData::parse("data:image/jpeg;base64,AAAA").unwrap();
        assert_eq!(photo.extension(), "jpg");
    }

    #[test]
    fn rejects_non_image_or_malformed_urls() {
        assert!(PhotoData::parse("data:text/plain;base64,aGVsbG8=").is_none());
        assert!(PhotoData::parse("data:image/png,aGVsbG8=").is_none());
        assert!(PhotoData::parse("data:image/;base64,aGVsbG8=").is_none());
        assert!(PhotoData::parse("data:image/png;base64,").is_none());
        assert!(PhotoData::parse("https://example.com/a.png").is_none());
    }

    #[test]
    fn bad_base64_surfaces_as_photo_error() {
        let photo = PhotoData::parse("data:image/png;base64,@@@").unwrap();
        assert!(matches!(photo.decode(), Err(StoreError::Photo(_))));
    }

    #[test]
    fn sync_status_policies() {
        let forced = SyncStatusPolicy::Forced("synced".into());
        assert_eq!(forced.resolve("pending"), "synced");
        assert_eq!(forced.resolve(""), "synced");

        let preserve = SyncStatusPolicy::PreserveOrDefault("pending".into());
        assert_eq!(preserve.resolve("local"), "local");
        assert_eq!(preserve.resolve(""), "pending");
    }
}
