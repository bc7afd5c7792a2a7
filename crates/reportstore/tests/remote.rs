use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use reportstore::remote::direct_view_url;
use reportstore::{
    DriveUploader, PhotoData, Report, SheetsStore, SpreadsheetStore, StoreError, HEADERS,
};
use serde_json::{json, Value};

#[derive(Clone, Debug)]
struct Recorded {
    method: Method,
    path: String,
    query: String,
    auth: String,
    body: Bytes,
}

#[derive(Default)]
struct Google {
    requests: Mutex<Vec<Recorded>>,
    header_written: AtomicBool,
}

impl Google {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn appends(&self) -> Vec<Vec<Vec<String>>> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::POST && r.path.ends_with(":append"))
            .map(|r| {
                let body: Value = serde_json::from_slice(&r.body).unwrap();
                serde_json::from_value(body["values"].clone()).unwrap()
            })
            .collect()
    }
}

// One handler for every endpoint; it dispatches on method and raw path.
async fn fake_google(
    State(google): State<Arc<Google>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    google.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().unwrap_or_default().to_string(),
        auth: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        body: body.clone(),
    });

    if path.contains("/missing") {
        return StatusCode::NOT_FOUND.into_response();
    }
    if path.contains("/broken") {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match (method, path.as_str()) {
        (Method::GET, p) if p.contains("/values/") => {
            if google.header_written.load(Ordering::SeqCst) {
                Json(json!({ "range": "A1:J1", "values": [HEADERS] })).into_response()
            } else {
                Json(json!({ "range": "A1:J1" })).into_response()
            }
        }
        (Method::POST, p) if p.ends_with(":append") => {
            let sent: Value = serde_json::from_slice(&body).unwrap_or_default();
            if sent["values"][0][0] == "ID" {
                google.header_written.store(true, Ordering::SeqCst);
            }
            Json(json!({ "updates": {} })).into_response()
        }
        (Method::POST, "/upload/drive/v3/files") => {
            Json(json!({ "id": "file123" })).into_response()
        }
        (Method::POST, p) if p.ends_with("/permissions") => {
            Json(json!({ "id": "anyoneWithLink" })).into_response()
        }
        (Method::GET, p) if p.starts_with("/v4/spreadsheets/") => {
            Json(json!({ "spreadsheetId": "sheet1" })).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start_google() -> (Arc<Google>, String) {
    let google = Arc::new(Google::default());
    let app = Router::new().fallback(fake_google).with_state(google.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (google, format!("http://{addr}"))
}

fn sheets(base: &str, sheet_id: &str) -> SheetsStore {
    let client = reqwest::Client::new();
    let uploader = DriveUploader::new(client.clone(), "tok".into(), "folder9".into())
        .with_base_url(base);
    SheetsStore::new(
        client,
        "tok".into(),
        sheet_id.into(),
        "Reportes".into(),
        Arc::new(uploader),
    )
    .with_base_url(base)
}

fn report(id: &str, photo: Option<&str>) -> Report {
    Report {
        id: id.into(),
        timestamp: "2024-01-01".into(),
        shift: "AM".into(),
        report_type: "Falla".into(),
        equipment: "Bomba1".into(),
        description: "Fuga".into(),
        operator: "Ana".into(),
        area: "Planta".into(),
        sync_status: "synced".into(),
        photo: photo.and_then(PhotoData::parse),
    }
}

#[tokio::test]
async fn test_header_is_written_only_to_an_empty_sheet() {
    let (google, base) = start_google().await;
    let store = sheets(&base, "sheet1");

    store.ensure_exists().await.unwrap();
    store.ensure_exists().await.unwrap();

    let appends = google.appends();
    assert_eq!(appends.len(), 1);
    let header = &appends[0][0];
    assert_eq!(header.len(), 10);
    assert_eq!(header[..9], HEADERS.map(String::from));
    assert_eq!(header[9], "Foto");

    let reads: Vec<Recorded> = google
        .requests()
        .into_iter()
        .filter(|r| r.method == Method::GET)
        .collect();
    assert_eq!(reads.len(), 2);
    assert!(reads[0].path.ends_with("/v4/spreadsheets/sheet1/values/Reportes%21A1%3AJ1"));
    assert!(google.requests().iter().all(|r| r.auth == "Bearer tok"));
}

#[tokio::test]
async fn test_batch_is_one_append_with_photo_link_in_tenth_column() {
    let (google, base) = start_google().await;
    let store = sheets(&base, "sheet1");

    let batch = [
        report("1", None),
        report("2", Some("data:image/png;base64,aGVsbG8=")),
        report("3", None),
    ];
    store.append_rows(&batch).await.unwrap();

    let appends = google.appends();
    assert_eq!(appends.len(), 1);
    let rows = &appends[0];
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.len() == 10));
    assert_eq!(
        rows[0][..9],
        ["1", "2024-01-01", "AM", "Falla", "Bomba1", "Fuga", "Ana", "Planta", "synced"]
    );
    assert_eq!(rows[0][9], "");
    assert_eq!(rows[1][9], direct_view_url("file123"));
    assert_eq!(rows[2][9], "");

    let requests = google.requests();
    let append = requests.iter().find(|r| r.path.ends_with(":append")).unwrap();
    assert!(append.query.contains("valueInputOption=USER_ENTERED"));
    assert!(append.query.contains("insertDataOption=INSERT_ROWS"));

    // upload, then make it public, then the single append
    let order: Vec<&str> = requests
        .iter()
        .map(|r| {
            if r.path == "/upload/drive/v3/files" {
                "upload"
            } else if r.path == "/drive/v3/files/file123/permissions" {
                "permission"
            } else {
                "append"
            }
        })
        .collect();
    assert_eq!(order, ["upload", "permission", "append"]);

    let upload = &requests[0];
    assert!(upload.query.contains("uploadType=multipart"));
    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains("\"name\":\"reporte_2.png\""));
    assert!(body.contains("\"parents\":[\"folder9\"]"));
    assert!(body.contains("Content-Type: image/png\r\n\r\nhello"));

    let permission: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(permission, json!({ "role": "reader", "type": "anyone" }));
}

#[tokio::test]
async fn test_describe_maps_lookup_status() {
    let (_google, base) = start_google().await;

    let found = sheets(&base, "sheet1").describe().await.unwrap();
    assert!(found.exists);
    assert_eq!(found.path, "sheets:sheet1/Reportes");
    assert_eq!(found.size_bytes, 0);

    assert!(!sheets(&base, "missing").describe().await.unwrap().exists);

    let err = sheets(&base, "broken").describe().await.unwrap_err();
    assert!(matches!(err, StoreError::Remote(_)));
}

#[tokio::test]
async fn test_failed_append_is_a_remote_error() {
    let (google, base) = start_google().await;
    let store = sheets(&base, "broken");

    let err = store.append_rows(&[report("1", None)]).await.unwrap_err();
    assert!(err.is_remote());
    assert_eq!(google.appends().len(), 1);
}
