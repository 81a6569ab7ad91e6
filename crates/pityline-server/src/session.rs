use crate::store::SessionStore;
use crate::telemetry::GateMetrics;
use pityline_model::SessionToken;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

pub const SESSION_COOKIE: &str = "pityline_session";
pub const SECURE_SESSION_COOKIE: &str = "__Secure-pityline_session";

/// Pull the session token out of a raw `Cookie` header.
///
/// Both the plain and the `__Secure-` prefixed cookie name are accepted;
/// when both are present the secure variant wins. Anything malformed is
/// treated as no token at all.
#[must_use]
pub fn session_token_from_cookies(cookie_header: Option<&str>) -> Option<SessionToken> {
    let raw = cookie_header?;
    let mut plain = None;
    let mut secure = None;
    for part in raw.split(';') {
        let Some((name, value)) = part.trim().split_once('=') else {
            continue;
        };
        match name {
            SECURE_SESSION_COOKIE => secure = Some(value),
            SESSION_COOKIE => plain = Some(value),
            _ => {}
        }
    }
    SessionToken::parse(secure.or(plain)?).ok()
}

/// Resolve whether a request carries an active admin session.
///
/// Fails closed: no token, lookup miss, store error, and timeout all
/// resolve to `false`. That is the safe default for a privilege check even
/// though the surrounding gate fails open.
pub async fn resolve_admin(
    token: Option<&SessionToken>,
    store: &dyn SessionStore,
    store_timeout: Duration,
    metrics: &GateMetrics,
) -> bool {
    let Some(token) = token else {
        return false;
    };
    match timeout(store_timeout, store.find_session(token.as_str())).await {
        Ok(Ok(Some(record))) => record.grants_admin(),
        Ok(Ok(None)) => false,
        Ok(Err(e)) => {
            metrics
                .session_lookup_failures
                .fetch_add(1, Ordering::Relaxed);
            warn!("session lookup failed, treating request as anonymous: {e}");
            false
        }
        Err(_) => {
            metrics
                .session_lookup_failures
                .fetch_add(1, Ordering::Relaxed);
            warn!("session lookup timed out, treating request as anonymous");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FakeStore;
    use pityline_model::{Role, SessionRecord};

    #[test]
    fn no_header_and_malformed_headers_yield_no_token() {
        assert!(session_token_from_cookies(None).is_none());
        assert!(session_token_from_cookies(Some("")).is_none());
        assert!(session_token_from_cookies(Some("garbage")).is_none());
        assert!(session_token_from_cookies(Some("other=value")).is_none());
    }

    #[test]
    fn plain_cookie_is_accepted() {
        let token = session_token_from_cookies(Some("pityline_session=tok123"))
            .expect("token");
        assert_eq!(token.as_str(), "tok123");
    }

    #[test]
    fn secure_cookie_is_preferred_over_plain() {
        let header = "pityline_session=plain1; __Secure-pityline_session=secure1";
        let token = session_token_from_cookies(Some(header)).expect("token");
        assert_eq!(token.as_str(), "secure1");
    }

    #[test]
    fn cookie_with_invalid_token_charset_is_dropped() {
        assert!(session_token_from_cookies(Some("pityline_session=bad chars")).is_none());
        assert!(session_token_from_cookies(Some("pityline_session=t%2Fok")).is_none());
        assert!(session_token_from_cookies(Some("pityline_session=")).is_none());
    }

    fn admin_session(token: &str, is_active: bool) -> SessionRecord {
        SessionRecord {
            token: token.to_string(),
            user_id: "u1".to_string(),
            role: Role::Admin,
            is_active,
        }
    }

    #[tokio::test]
    async fn missing_token_skips_the_store_entirely() {
        let store = FakeStore::default();
        let metrics = GateMetrics::default();
        assert!(!resolve_admin(None, &store, Duration::from_millis(100), &metrics).await);
        assert_eq!(
            store
                .session_find_calls
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }

    #[tokio::test]
    async fn only_active_admin_sessions_resolve_true() {
        let store = FakeStore::default();
        let metrics = GateMetrics::default();
        store
            .insert_session(&admin_session("good", true))
            .await
            .expect("insert");
        store
            .insert_session(&admin_session("inactive", false))
            .await
            .expect("insert");

        let good = SessionToken::parse("good").expect("token");
        let inactive = SessionToken::parse("inactive").expect("token");
        let unknown = SessionToken::parse("unknown").expect("token");
        let wait = Duration::from_millis(100);

        assert!(resolve_admin(Some(&good), &store, wait, &metrics).await);
        assert!(!resolve_admin(Some(&inactive), &store, wait, &metrics).await);
        assert!(!resolve_admin(Some(&unknown), &store, wait, &metrics).await);
    }

    #[tokio::test]
    async fn store_failure_fails_closed() {
        let store = FakeStore::default();
        let metrics = GateMetrics::default();
        store
            .insert_session(&admin_session("good", true))
            .await
            .expect("insert");
        store
            .fail_sessions
            .store(true, std::sync::atomic::Ordering::Relaxed);

        let good = SessionToken::parse("good").expect("token");
        assert!(!resolve_admin(Some(&good), &store, Duration::from_millis(100), &metrics).await);
        assert_eq!(
            metrics
                .session_lookup_failures
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn slow_lookup_times_out_to_not_admin() {
        let store = FakeStore::default();
        let metrics = GateMetrics::default();
        store
            .insert_session(&admin_session("good", true))
            .await
            .expect("insert");
        store
            .slow_read
            .store(true, std::sync::atomic::Ordering::Relaxed);

        let good = SessionToken::parse("good").expect("token");
        assert!(!resolve_admin(Some(&good), &store, Duration::from_millis(20), &metrics).await);
    }
}
