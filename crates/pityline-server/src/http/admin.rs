use crate::error::AppError;
use crate::session::session_token_from_cookies;
use crate::AppState;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use pityline_model::{parse_slug, Article, SessionRecord, SettingsUpdate, TITLE_MAX_LEN};
use serde_json::json;
use tokio::time::timeout;
use tracing::{info, warn};

/// Admin authorization for handlers, independent of the maintenance gate:
/// these routes require an active admin session even when the site is up.
/// Store failures resolve to unauthorized, the same fail-closed default the
/// gate's session sub-check uses.
pub(crate) async fn require_admin(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<SessionRecord, AppError> {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok());
    let token = session_token_from_cookies(cookie_header).ok_or(AppError::Unauthorized)?;
    let lookup = timeout(
        state.gate.store_timeout,
        state.session_store.find_session(token.as_str()),
    )
    .await;
    match lookup {
        Ok(Ok(Some(record))) if record.grants_admin() => Ok(record),
        Ok(Ok(_)) => Err(AppError::Unauthorized),
        Ok(Err(e)) => {
            warn!("session lookup failed during admin check: {e}");
            Err(AppError::Unauthorized)
        }
        Err(_) => {
            warn!("session lookup timed out during admin check");
            Err(AppError::Unauthorized)
        }
    }
}

pub(crate) async fn get_maintenance_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    require_admin(&state, &headers).await?;
    // Fresh read on purpose: the operator toggling the gate should see the
    // stored truth, not a cached snapshot.
    let settings = state.settings_store.load_settings().await?;
    Ok(Json(settings).into_response())
}

pub(crate) async fn update_maintenance_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<SettingsUpdate>,
) -> Result<Response, AppError> {
    let actor = require_admin(&state, &headers).await?;
    let mut settings = state.settings_store.load_settings().await?;
    settings.apply_update(update, &actor.user_id, Utc::now());
    settings
        .validate()
        .map_err(|e| AppError::Invalid(e.to_string()))?;
    state.settings_store.save_settings(&settings).await?;
    // Invalidate right after the write so the next request sees the toggle
    // without waiting out the cache TTL.
    state.settings_cache.invalidate().await;
    info!(
        actor = %actor.user_id,
        is_enabled = settings.is_enabled,
        allow_admin_access = settings.allow_admin_access,
        "maintenance settings updated"
    );
    Ok(Json(settings).into_response())
}

pub(crate) async fn dashboard_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let admin = require_admin(&state, &headers).await?;
    Ok(Json(json!({
        "admin": admin.user_id,
        "sections": ["articles", "maintenance"],
    }))
    .into_response())
}

pub(crate) async fn admin_articles_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    require_admin(&state, &headers).await?;
    let articles = state
        .articles
        .list_articles(None, state.server.article_page_limit)
        .await?;
    Ok(Json(json!({ "articles": articles })).into_response())
}

pub(crate) async fn upsert_article_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(article): Json<Article>,
) -> Result<Response, AppError> {
    let actor = require_admin(&state, &headers).await?;
    parse_slug(&article.slug).map_err(|e| AppError::Invalid(e.to_string()))?;
    if article.title.is_empty() || article.title.len() > TITLE_MAX_LEN {
        return Err(AppError::Invalid(format!(
            "title must be 1..={TITLE_MAX_LEN} bytes"
        )));
    }
    state.articles.upsert_article(&article).await?;
    info!(actor = %actor.user_id, slug = %article.slug, "article upserted");
    Ok(Json(article).into_response())
}
