use axum::{
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use reportstore::{IntakeError, StoreError, WriteError};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::state::SharedState;

type ApiError = (StatusCode, Json<Value>);

fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "ok": false, "error": msg.into() })))
}

// Body is taken raw so empty, oversized and malformed payloads get the same
// error shape as every other failure.
pub async fn post_reports(
    State(state): State<SharedState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = body.map_err(|e| {
        warn!("request body rejected: {e}");
        (e.status(), Json(json!({ "ok": false, "error": e.body_text() })))
    })?;
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(bad_request("empty request body"));
    }
    let raw: Value = serde_json::from_slice(&body)
        .map_err(|e| bad_request(format!("invalid JSON body: {e}")))?;

    match state.intake.submit(raw).await {
        Ok(receipt) => Ok(Json(json!({
            "ok": true,
            "accepted": receipt.accepted,
            "batchId": receipt.batch_id,
            "rejected": receipt.rejected,
        }))),
        Err(e @ IntakeError::InvalidBody) => Err(bad_request(e.to_string())),
        Err(IntakeError::NoValidReports { rejected }) => {
            warn!(rejected = rejected.len(), "batch had no valid reports");
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "ok": false,
                    "error": "no valid reports in request; see rejected for the reason per item",
                    "rejected": rejected,
                })),
            ))
        }
        Err(IntakeError::Write(e)) => {
            error!("report append failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": write_error_message(&e) })),
            ))
        }
    }
}

pub(crate) fn write_error_message(e: &WriteError) -> String {
    match e {
        WriteError::Store(se) if se.is_remote() => se.to_string(),
        WriteError::Store(se @ StoreError::Unsupported(_)) => se.to_string(),
        WriteError::Store(_) => "failed to persist reports".to_string(),
        other => other.to_string(),
    }
}
