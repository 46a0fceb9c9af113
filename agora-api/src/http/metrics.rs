//! Prometheus scrape endpoint

use axum::{http::header, response::IntoResponse, routing::get, Router};

use agora_core::metrics::gather_metrics;

use crate::http::{AppResult, AppState};

pub fn create_metrics_router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Render every registered metric in the Prometheus text format
pub async fn metrics_handler() -> AppResult<impl IntoResponse> {
    let body = gather_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}
