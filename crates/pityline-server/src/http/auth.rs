use crate::error::AppError;
use crate::session::{session_token_from_cookies, SECURE_SESSION_COOKIE, SESSION_COOKIE};
use crate::AppState;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hmac::{Hmac, Mac};
use pityline_model::SessionRecord;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    username: String,
    password: String,
}

fn hmac_hex(secret: &str, parts: &[&[u8]]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    for part in parts {
        mac.update(part);
    }
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Stored password form: hex HMAC-SHA256 of the password under the server
/// secret. Verification is recomputation plus comparison.
#[must_use]
pub fn password_hmac(secret: &str, password: &str) -> Option<String> {
    hmac_hex(secret, &[password.as_bytes()])
}

fn mint_session_token(secret: &str, username: &str) -> Option<String> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    hmac_hex(secret, &[username.as_bytes(), &nanos.to_be_bytes()])
}

fn session_cookie(state: &AppState, token: &str, max_age: Option<u64>) -> String {
    let name = if state.server.secure_cookies {
        SECURE_SESSION_COOKIE
    } else {
        SESSION_COOKIE
    };
    let mut cookie = format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax");
    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={age}"));
    }
    if state.server.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let account = state
        .session_store
        .find_user(&request.username)
        .await?
        .filter(|a| a.is_active);
    let Some(account) = account else {
        warn!(username = %request.username, "login rejected: unknown or inactive account");
        return Err(AppError::Unauthorized);
    };
    let expected = password_hmac(&state.server.auth_secret, &request.password);
    if expected.is_none() || expected.as_deref() != Some(account.password_hmac.as_str()) {
        warn!(username = %request.username, "login rejected: bad credentials");
        return Err(AppError::Unauthorized);
    }

    let Some(token) = mint_session_token(&state.server.auth_secret, &account.username) else {
        return Err(AppError::Unauthorized);
    };
    let record = SessionRecord {
        token: token.clone(),
        user_id: account.user_id.clone(),
        role: account.role,
        is_active: true,
    };
    state.session_store.insert_session(&record).await?;
    info!(user_id = %account.user_id, role = %account.role, "login succeeded");

    let mut response = Json(json!({
        "user_id": account.user_id,
        "role": account.role,
    }))
    .into_response();
    if let Ok(value) = HeaderValue::from_str(&session_cookie(&state, &token, None)) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

pub(crate) async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok());
    if let Some(token) = session_token_from_cookies(cookie_header) {
        state.session_store.deactivate_session(token.as_str()).await?;
    }
    let mut response = Json(json!({"logged_out": true})).into_response();
    if let Ok(value) = HeaderValue::from_str(&session_cookie(&state, "", Some(0))) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}
