use crate::error::AppError;
use crate::telemetry::render_metrics;
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pityline_model::Section;
use serde_json::json;
use std::collections::HashMap;
use tokio::time::timeout;

pub(crate) async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Ready only when the settings singleton is reachable; a dead store means
/// the gate is running fail-open and the pod should be rotated out.
pub(crate) async fn readyz_handler(State(state): State<AppState>) -> Response {
    let probe = timeout(
        state.gate.store_timeout,
        state.settings_store.load_settings(),
    )
    .await;
    match probe {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "not-ready").into_response(),
    }
}

pub(crate) async fn metrics_handler(State(state): State<AppState>) -> Response {
    let body = render_metrics(&state.metrics);
    let mut response = (StatusCode::OK, body).into_response();
    response.headers_mut().insert(
        "content-type",
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

pub(crate) async fn articles_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let section = params
        .get("section")
        .map(|raw| Section::parse(raw).map_err(|e| AppError::Invalid(e.to_string())))
        .transpose()?;
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(state.server.article_page_limit)
        .min(state.server.article_page_limit);
    let articles = state.articles.list_articles(section, limit).await?;
    Ok(Json(json!({ "articles": articles })).into_response())
}
