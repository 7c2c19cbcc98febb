//! Health check and client error handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::shared::extract::ApiJson;
use crate::core::shared::state::AppState;

const SERVICE: &str = "pulse";
const MAX_CLIENT_ERRORS: usize = 50;

/// Liveness only; never touches the database.
pub async fn health_check_simple() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": SERVICE,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let pool = state.conn.clone();
    let db_ok = tokio::task::spawn_blocking(move || pool.get().is_ok())
        .await
        .unwrap_or(false);

    let (code, status) = if db_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "service": SERVICE,
            "version": env!("CARGO_PKG_VERSION"),
            "database": db_ok,
            "llm": state.llm_provider.is_some()
        })),
    )
}

#[derive(Debug, Deserialize)]
pub struct ClientErrorsRequest {
    errors: Vec<ClientErrorData>,
}

#[derive(Debug, Deserialize)]
pub struct ClientErrorData {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    stack: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    timestamp: String,
}

/// Writes SPA error reports to the log. Oversized batches are cut short.
pub async fn receive_client_errors(
    ApiJson(payload): ApiJson<ClientErrorsRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    for error in payload.errors.iter().take(MAX_CLIENT_ERRORS) {
        log::error!(
            "[CLIENT ERROR] {} | {} | {} | URL: {} | Stack: {}",
            error.timestamp,
            error.r#type,
            error.message,
            error.url,
            error.stack.as_deref().unwrap_or("<no stack>")
        );
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "received",
            "count": payload.errors.len().min(MAX_CLIENT_ERRORS)
        })),
    )
}
