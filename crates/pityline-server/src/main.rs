#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use pityline_model::{Role, UserAccount};
use pityline_server::{
    build_router, password_hmac, validate_startup_config, AppState, GateConfig, ServerConfig,
    SqliteStore,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

fn env_prefix_list(name: &str, default: Vec<String>) -> Vec<String> {
    let raw = env::var(name).unwrap_or_default();
    if raw.trim().is_empty() {
        return default;
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn env_launch_date(name: &str, default: DateTime<Utc>) -> DateTime<Utc> {
    env::var(name)
        .ok()
        .and_then(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|t| t.with_timezone(&Utc))
                .ok()
        })
        .unwrap_or(default)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("PITYLINE_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Bootstrap admin account from env, for first deploys and secret rotation.
async fn seed_admin_account(store: &SqliteStore, secret: &str) -> Result<(), String> {
    let (Ok(username), Ok(password)) = (
        env::var("PITYLINE_ADMIN_USER"),
        env::var("PITYLINE_ADMIN_PASSWORD"),
    ) else {
        return Ok(());
    };
    let Some(hash) = password_hmac(secret, &password) else {
        return Err("admin password hash failed".to_string());
    };
    let account = UserAccount {
        user_id: format!("admin-{username}"),
        username: username.clone(),
        password_hmac: hash,
        role: Role::Admin,
        is_active: true,
    };
    pityline_server::SessionStore::upsert_user(store, &account)
        .await
        .map_err(|e| format!("admin seed failed: {e}"))?;
    info!(username = %username, "admin account seeded");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let gate_defaults = GateConfig::default();
    let gate = GateConfig {
        always_allowed_prefixes: env_prefix_list(
            "PITYLINE_ALWAYS_ALLOWED_PREFIXES",
            gate_defaults.always_allowed_prefixes.clone(),
        ),
        coming_soon_prefixes: env_prefix_list(
            "PITYLINE_COMING_SOON_PREFIXES",
            gate_defaults.coming_soon_prefixes.clone(),
        ),
        coming_soon_launch: env_launch_date(
            "PITYLINE_COMING_SOON_LAUNCH",
            gate_defaults.coming_soon_launch,
        ),
        admin_prefixes: gate_defaults.admin_prefixes.clone(),
        api_prefix: gate_defaults.api_prefix.clone(),
        settings_cache_ttl: env_duration_ms("PITYLINE_SETTINGS_CACHE_TTL_MS", 5000),
        store_timeout: env_duration_ms("PITYLINE_STORE_TIMEOUT_MS", 500),
    };

    let auth_secret = env::var("PITYLINE_AUTH_SECRET").unwrap_or_else(|_| {
        warn!("PITYLINE_AUTH_SECRET not set, using the insecure dev default");
        ServerConfig::default().auth_secret
    });
    let server = ServerConfig {
        bind_addr: env::var("PITYLINE_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        database_path: PathBuf::from(
            env::var("PITYLINE_DB_PATH").unwrap_or_else(|_| "data/pityline.sqlite".to_string()),
        ),
        auth_secret,
        secure_cookies: env_bool("PITYLINE_SECURE_COOKIES", false),
        max_body_bytes: env_usize("PITYLINE_MAX_BODY_BYTES", 16 * 1024),
        article_page_limit: env_usize("PITYLINE_ARTICLE_PAGE_LIMIT", 20),
    };

    validate_startup_config(&gate, &server)?;

    if let Some(parent) = server.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("database dir create failed: {e}"))?;
        }
    }
    let store = Arc::new(SqliteStore::new(server.database_path.clone()));
    store
        .init_schema()
        .await
        .map_err(|e| format!("schema bootstrap failed: {e}"))?;
    seed_admin_account(&store, &server.auth_secret).await?;

    let bind_addr = server.bind_addr.clone();
    let state = AppState::with_config(
        store.clone(),
        store.clone(),
        store,
        gate,
        server,
    );
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| format!("bind {bind_addr} failed: {e}"))?;
    info!("pityline-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|e| format!("server failed: {e}"))
}
