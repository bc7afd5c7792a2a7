use axum::{extract::State, http::StatusCode};
use tracing::{error, warn};

use crate::routes_reports::write_error_message;
use crate::state::SharedState;

pub async fn get_test_create(State(state): State<SharedState>) -> (StatusCode, String) {
    match state.intake.create_artifact().await {
        Ok(()) => (
            StatusCode::OK,
            format!("Workbook ready: {}", state.store().artifact_name()),
        ),
        Err(e) => {
            error!("diagnostic create failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, write_error_message(&e))
        }
    }
}

// Destroys every stored report.
pub async fn get_reset(State(state): State<SharedState>) -> (StatusCode, String) {
    warn!(artifact = %state.store().artifact_name(), "resetting artifact on request");
    match state.intake.reset_artifact().await {
        Ok(()) => (
            StatusCode::OK,
            format!("Workbook reset: {}", state.store().artifact_name()),
        ),
        Err(e) => {
            error!("diagnostic reset failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, write_error_message(&e))
        }
    }
}
