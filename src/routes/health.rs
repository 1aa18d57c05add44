use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let data_dir = &state.config.data_dir;
    match tokio::fs::metadata(data_dir).await {
        Ok(meta) if meta.is_dir() => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "data_dir": data_dir.display().to_string(),
                "registered_emails": state.gate.allow_list().len(),
            })),
        ),
        Ok(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "data_dir": "not a directory" })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "data_dir": e.to_string() })),
        ),
    }
}
