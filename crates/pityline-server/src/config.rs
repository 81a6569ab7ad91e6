use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

/// Launch date for sections that are published in the router but not yet
/// announced. Before this instant, paths under `coming_soon_prefixes`
/// redirect to the coming-soon page; from this instant on they are ordinary
/// paths forever, regardless of the prefix list.
const DEFAULT_COMING_SOON_LAUNCH: &str = "2026-10-01T00:00:00Z";

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Prefixes reachable while maintenance is active. Must keep the
    /// maintenance page, the settings-toggle API, and the auth routes
    /// reachable or an enabled gate can never be disabled again.
    pub always_allowed_prefixes: Vec<String>,
    pub coming_soon_prefixes: Vec<String>,
    pub coming_soon_launch: DateTime<Utc>,
    pub admin_prefixes: Vec<String>,
    pub api_prefix: String,
    pub settings_cache_ttl: Duration,
    pub store_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            always_allowed_prefixes: vec![
                "/maintenance".to_string(),
                "/api/admin/maintenance".to_string(),
                "/api/auth".to_string(),
                "/assets".to_string(),
                "/favicon.ico".to_string(),
                "/healthz".to_string(),
                "/readyz".to_string(),
                "/metrics".to_string(),
            ],
            coming_soon_prefixes: vec!["/guides".to_string()],
            coming_soon_launch: default_coming_soon_launch(),
            admin_prefixes: vec!["/admin".to_string(), "/api/admin".to_string()],
            api_prefix: "/api/".to_string(),
            settings_cache_ttl: Duration::from_secs(5),
            store_timeout: Duration::from_millis(500),
        }
    }
}

fn default_coming_soon_launch() -> DateTime<Utc> {
    // An unparseable constant degrades to "already launched": no redirects.
    DateTime::parse_from_rfc3339(DEFAULT_COMING_SOON_LAUNCH)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub auth_secret: String,
    pub secure_cookies: bool,
    pub max_body_bytes: usize,
    pub article_page_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_path: PathBuf::from("data/pityline.sqlite"),
            auth_secret: "insecure-dev-secret".to_string(),
            secure_cookies: false,
            max_body_bytes: 16 * 1024,
            article_page_limit: 20,
        }
    }
}

pub fn validate_startup_config(gate: &GateConfig, server: &ServerConfig) -> Result<(), String> {
    if gate.settings_cache_ttl.is_zero() || gate.store_timeout.is_zero() {
        return Err("cache ttl and store timeout must be > 0".to_string());
    }
    let lockout_guards = ["/maintenance", "/api/admin/maintenance", "/api/auth"];
    for guard in lockout_guards {
        if !gate.always_allowed_prefixes.iter().any(|p| p == guard) {
            return Err(format!(
                "always-allowed prefixes must contain {guard}; dropping it locks operators out \
                 of an enabled maintenance gate"
            ));
        }
    }
    if gate.api_prefix.is_empty() || !gate.api_prefix.starts_with('/') {
        return Err("api prefix must start with '/'".to_string());
    }
    if gate
        .admin_prefixes
        .iter()
        .chain(gate.coming_soon_prefixes.iter())
        .any(|p| !p.starts_with('/'))
    {
        return Err("gate path prefixes must start with '/'".to_string());
    }
    if server.auth_secret.is_empty() {
        return Err("auth secret must not be empty".to_string());
    }
    if server.max_body_bytes == 0 || server.article_page_limit == 0 {
        return Err("body and page size limits must be > 0".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_startup_validation() {
        validate_startup_config(&GateConfig::default(), &ServerConfig::default())
            .expect("defaults valid");
    }

    #[test]
    fn startup_validation_rejects_lockout_prone_allowlist() {
        let mut gate = GateConfig::default();
        gate.always_allowed_prefixes
            .retain(|p| p != "/api/admin/maintenance");
        let err = validate_startup_config(&gate, &ServerConfig::default())
            .expect_err("missing toggle route");
        assert!(err.contains("/api/admin/maintenance"));
    }

    #[test]
    fn startup_validation_rejects_zero_ttl_and_empty_secret() {
        let gate = GateConfig {
            settings_cache_ttl: Duration::ZERO,
            ..GateConfig::default()
        };
        assert!(validate_startup_config(&gate, &ServerConfig::default()).is_err());

        let server = ServerConfig {
            auth_secret: String::new(),
            ..ServerConfig::default()
        };
        assert!(validate_startup_config(&GateConfig::default(), &server).is_err());
    }

    #[test]
    fn startup_validation_rejects_relative_prefixes() {
        let gate = GateConfig {
            coming_soon_prefixes: vec!["guides".to_string()],
            ..GateConfig::default()
        };
        assert!(validate_startup_config(&gate, &ServerConfig::default()).is_err());
    }

    #[test]
    fn default_launch_date_parses() {
        let gate = GateConfig::default();
        assert!(gate.coming_soon_launch > DateTime::<Utc>::MIN_UTC);
    }
}
