use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::error::Error;
use crate::report::AnomalyReport;

use super::types::*;
use super::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

const UPLOAD_FIELD: &str = "file";

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

/// Map a pipeline error to a status: bad input is the client's problem, a
/// model that cannot score the server's own features is ours.
fn pipeline_error(err: &Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        Error::Csv(_) => StatusCode::BAD_REQUEST,
        Error::Schema { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "Scoring failed");
    } else {
        tracing::warn!(error = %err, "Rejected upload");
    }
    api_error(status, err.to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn home() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "PulseGuard API is running".to_string(),
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.pipeline.model().info(),
    })
}

// ============================================================
// Predict
// ============================================================

pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<AnomalyReport> {
    let missing_file = || {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Upload a CSV with '{}' field", UPLOAD_FIELD),
        )
    };

    let mut multipart = multipart.map_err(|_| missing_file())?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(e.status(), e.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| api_error(e.status(), e.body_text()))?;
            upload = Some(bytes);
            break;
        }
    }
    let bytes = upload.ok_or_else(missing_file)?;
    tracing::debug!(bytes = bytes.len(), "Received upload");

    let pipeline = state.pipeline.clone();
    tokio::task::spawn_blocking(move || pipeline.score_csv(&bytes))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map(Json)
        .map_err(|e| pipeline_error(&e))
}
