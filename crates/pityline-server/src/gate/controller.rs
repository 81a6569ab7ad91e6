use crate::gate::classifier::{classify, PathClass};
use crate::session::{resolve_admin, session_token_from_cookies};
use crate::AppState;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::sync::atomic::Ordering;
use tracing::info;

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    PassThrough,
    RedirectTo(String),
}

/// Decide what happens to a request before any handler runs.
///
/// Every fallible step degrades at its own site per the documented policy:
/// the settings read fails open inside the cache (maintenance treated as
/// disabled), the session lookup fails closed inside the resolver (treated
/// as not-admin). The gate itself therefore never errors and never turns an
/// internal failure into a 5xx.
pub async fn decide(
    state: &AppState,
    path: &str,
    cookie_header: Option<&str>,
    now: DateTime<Utc>,
) -> GateDecision {
    let class = classify(path, now, &state.gate);

    if class == PathClass::ComingSoonGated {
        state
            .metrics
            .coming_soon_redirects_total
            .fetch_add(1, Ordering::Relaxed);
        let encoded = utf8_percent_encode(path, NON_ALPHANUMERIC);
        return GateDecision::RedirectTo(format!("/coming-soon?page={encoded}"));
    }

    let settings = state
        .settings_cache
        .current(state.settings_store.as_ref())
        .await;
    if !settings.is_enabled {
        state.metrics.gate_pass_total.fetch_add(1, Ordering::Relaxed);
        return GateDecision::PassThrough;
    }

    match class {
        PathClass::AlwaysAllowed => {
            state.metrics.gate_pass_total.fetch_add(1, Ordering::Relaxed);
            GateDecision::PassThrough
        }
        PathClass::AdminScoped if settings.allow_admin_access => {
            let token = session_token_from_cookies(cookie_header);
            if resolve_admin(
                token.as_ref(),
                state.session_store.as_ref(),
                state.gate.store_timeout,
                &state.metrics,
            )
            .await
            {
                info!(path = %path, "admin bypass through maintenance gate");
                state.metrics.gate_pass_total.fetch_add(1, Ordering::Relaxed);
                GateDecision::PassThrough
            } else {
                maintenance_redirect(state)
            }
        }
        _ => maintenance_redirect(state),
    }
}

fn maintenance_redirect(state: &AppState) -> GateDecision {
    state
        .metrics
        .maintenance_redirects_total
        .fetch_add(1, Ordering::Relaxed);
    GateDecision::RedirectTo("/maintenance".to_string())
}
