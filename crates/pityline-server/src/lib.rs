#![forbid(unsafe_code)]
//! Pityline server: the request gate and the handlers behind it.
//!
//! Every request flows through three layers before any handler runs:
//! request tracing, the response finisher (sensitive-path denylist plus
//! security headers), and the maintenance/coming-soon gate. The gate's
//! collaborators (settings cache, stores) live on [`AppState`] and are
//! injected explicitly; there is no module-level mutable state anywhere.

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

mod cache;
mod config;
mod error;
mod gate;
mod http;
mod middleware;
mod session;
mod store;
mod telemetry;

pub use cache::SettingsCache;
pub use config::{validate_startup_config, GateConfig, ServerConfig, CONFIG_SCHEMA_VERSION};
pub use error::AppError;
pub use gate::{classify, decide, GateDecision, PathClass};
pub use http::auth::password_hmac;
pub use session::{
    resolve_admin, session_token_from_cookies, SECURE_SESSION_COOKIE, SESSION_COOKIE,
};
pub use store::{
    ArticleStore, FakeStore, SessionStore, SettingsStore, SqliteStore, StoreError,
};
pub use telemetry::GateMetrics;

pub const CRATE_NAME: &str = "pityline-server";

#[derive(Clone)]
pub struct AppState {
    pub settings_store: Arc<dyn SettingsStore>,
    pub session_store: Arc<dyn SessionStore>,
    pub articles: Arc<dyn ArticleStore>,
    pub settings_cache: Arc<SettingsCache>,
    pub gate: GateConfig,
    pub server: ServerConfig,
    pub metrics: Arc<GateMetrics>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn with_config(
        settings_store: Arc<dyn SettingsStore>,
        session_store: Arc<dyn SessionStore>,
        articles: Arc<dyn ArticleStore>,
        gate: GateConfig,
        server: ServerConfig,
    ) -> Self {
        let metrics = Arc::new(GateMetrics::default());
        Self {
            settings_cache: Arc::new(SettingsCache::new(
                gate.settings_cache_ttl,
                gate.store_timeout,
                Arc::clone(&metrics),
            )),
            settings_store,
            session_store,
            articles,
            gate,
            server,
            metrics,
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::pages::home_handler))
        .route("/news", get(http::pages::news_handler))
        .route("/guides", get(http::pages::guides_handler))
        .route("/articles/:slug", get(http::pages::article_handler))
        .route("/maintenance", get(http::pages::maintenance_handler))
        .route("/coming-soon", get(http::pages::coming_soon_handler))
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/readyz", get(http::handlers::readyz_handler))
        .route("/metrics", get(http::handlers::metrics_handler))
        .route("/api/articles", get(http::handlers::articles_handler))
        .route("/api/auth/login", post(http::auth::login_handler))
        .route("/api/auth/logout", post(http::auth::logout_handler))
        .route(
            "/api/admin/maintenance",
            get(http::admin::get_maintenance_handler).post(http::admin::update_maintenance_handler),
        )
        .route(
            "/api/admin/articles",
            post(http::admin::upsert_article_handler),
        )
        .route("/admin", get(http::admin::dashboard_handler))
        .route("/admin/articles", get(http::admin::admin_articles_handler))
        // Innermost first: the gate runs inside the finisher, so probes are
        // rejected before gate evaluation and gate redirects still pick up
        // the security headers.
        .layer(from_fn_with_state(
            state.clone(),
            middleware::gate::maintenance_gate_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::security::security_headers_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_tracing::request_tracing_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.server.max_body_bytes))
        .with_state(state)
}
