use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reportstore::xlsx::XLSX_CONTENT_TYPE;
use serde_json::{json, Value};
use tracing::error;

use crate::state::SharedState;

type ApiError = (StatusCode, Json<Value>);

fn internal(e: reportstore::StoreError) -> ApiError {
    error!("store probe failed: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false, "error": e.to_string() })),
    )
}

pub async fn get_root(State(state): State<SharedState>) -> String {
    format!("OK report-intake ({})", state.store().backend())
}

pub async fn get_health(
    State(state): State<SharedState>,
) -> Result<Json<reportstore::Health>, ApiError> {
    reportstore::health(state.store()).await.map(Json).map_err(internal)
}

pub async fn get_status(
    State(state): State<SharedState>,
) -> Result<Json<reportstore::Status>, ApiError> {
    reportstore::status(state.store()).await.map(Json).map_err(internal)
}

pub async fn get_download(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store();
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "error": format!("{name} not found") })),
        )
    };

    if name != store.artifact_name() {
        return Err(not_found());
    }
    let bytes = store.read_artifact().await.map_err(internal)?;
    let Some(bytes) = bytes else {
        return Err(not_found());
    };

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate".to_string(),
            ),
            (header::PRAGMA, "no-cache".to_string()),
            (header::EXPIRES, "0".to_string()),
        ],
        Body::from(bytes),
    )
        .into_response())
}
