// SPDX-License-Identifier: Apache-2.0

use crate::gate::{decide, GateDecision};
use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;

/// The maintenance/coming-soon gate, run before every route handler.
///
/// Only the path and the session cookie are consumed; the body is never
/// touched. A redirect decision short-circuits the handler entirely.
pub(crate) async fn maintenance_gate_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let cookie_header = request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    match decide(&state, &path, cookie_header.as_deref(), Utc::now()).await {
        GateDecision::PassThrough => next.run(request).await,
        GateDecision::RedirectTo(target) => Redirect::temporary(&target).into_response(),
    }
}
