// SPDX-License-Identifier: Apache-2.0

use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::atomic::Ordering;
use tracing::warn;

/// Filename fragments that only ever appear in probes for deployment
/// artifacts, never in legitimate site paths.
pub(crate) const SENSITIVE_PATH_FRAGMENTS: &[&str] = &[
    ".env",
    ".git",
    "package.json",
    "package-lock.json",
    "yarn.lock",
];

pub(crate) fn is_sensitive_probe(path: &str) -> bool {
    SENSITIVE_PATH_FRAGMENTS.iter().any(|f| path.contains(f))
}

/// Response finisher: denylist rejection plus uniform header injection.
///
/// Runs outside the maintenance gate, so probes are rejected and headers
/// are applied whatever the gate decides, including on its redirects.
/// Header mutation only; no state is touched.
pub(crate) async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_sensitive_probe(&path) {
        state
            .metrics
            .sensitive_probes_blocked_total
            .fetch_add(1, Ordering::Relaxed);
        warn!(path = %path, "sensitive path probe blocked");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "permissions-policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );

    if path.starts_with(&state.gate.api_prefix) {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate"),
        );
        headers.insert("pragma", HeaderValue::from_static("no-cache"));
    }
    // Admin surfaces get the stricter variant; insert() replaces the API
    // value for paths under both prefixes.
    if state
        .gate
        .admin_prefixes
        .iter()
        .any(|p| path.starts_with(p))
    {
        headers.insert("x-robots-tag", HeaderValue::from_static("noindex, nofollow"));
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("private, no-store, no-cache, must-revalidate"),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_artifact_probes_are_detected_anywhere_in_the_path() {
        assert!(is_sensitive_probe("/.env"));
        assert!(is_sensitive_probe("/backup/.env.production"));
        assert!(is_sensitive_probe("/.git/config"));
        assert!(is_sensitive_probe("/package.json"));
        assert!(is_sensitive_probe("/static/package-lock.json"));
        assert!(is_sensitive_probe("/yarn.lock"));
    }

    #[test]
    fn ordinary_site_paths_are_not_probes() {
        assert!(!is_sensitive_probe("/"));
        assert!(!is_sensitive_probe("/guides/pity-system"));
        assert!(!is_sensitive_probe("/articles/environment-story"));
        assert!(!is_sensitive_probe("/api/articles"));
    }
}
