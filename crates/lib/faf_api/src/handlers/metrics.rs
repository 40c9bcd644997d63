//! Prometheus scrape endpoint.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

use crate::AppState;
use crate::error::{AppError, AppResult};

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// `GET /metrics`: lifecycle counters in the Prometheus text format.
pub async fn render(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let body = state
        .service
        .metrics()
        .render()
        .map_err(|e| AppError::Internal(format!("metrics encoding: {e}")))?;
    Ok(([(CONTENT_TYPE, TEXT_FORMAT)], body))
}
