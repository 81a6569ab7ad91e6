use chrono::{TimeZone, Utc};
use pityline_model::{Article, Role, Section, UserAccount};
use pityline_server::{
    build_router, password_hmac, AppState, FakeStore, GateConfig, ServerConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const AUTH_SECRET: &str = "test-secret";

async fn seed_store(store: &FakeStore) {
    store
        .users
        .lock()
        .await
        .insert(
            "mika".to_string(),
            UserAccount {
                user_id: "u-mika".to_string(),
                username: "mika".to_string(),
                password_hmac: password_hmac(AUTH_SECRET, "correct horse").expect("hash"),
                role: Role::Admin,
                is_active: true,
            },
        );
    store
        .articles
        .lock()
        .await
        .insert(
            "banner-schedule".to_string(),
            Article {
                slug: "banner-schedule".to_string(),
                title: "Banner schedule".to_string(),
                summary: "Upcoming banners".to_string(),
                body: "All the dates.".to_string(),
                section: Section::News,
                published_at: Utc
                    .with_ymd_and_hms(2026, 3, 10, 9, 0, 0)
                    .single()
                    .expect("timestamp"),
            },
        );
}

async fn spawn_server(gate: GateConfig) -> (std::net::SocketAddr, Arc<FakeStore>) {
    let store = Arc::new(FakeStore::default());
    seed_store(&store).await;
    let server = ServerConfig {
        auth_secret: AUTH_SECRET.to_string(),
        ..ServerConfig::default()
    };
    let state = AppState::with_config(store.clone(), store.clone(), store.clone(), gate, server);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    (addr, store)
}

async fn send_raw(
    addr: std::net::SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    if let Some(body) = body {
        req.push_str(&format!(
            "content-type: application/json\r\ncontent-length: {}\r\n",
            body.len()
        ));
    }
    req.push_str("\r\n");
    if let Some(body) = body {
        req.push_str(body);
    }
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head.to_string(), body.to_string())
}

fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

async fn login_admin(addr: std::net::SocketAddr) -> String {
    let body = json!({"username": "mika", "password": "correct horse"}).to_string();
    let (status, head, _) = send_raw(addr, "POST", "/api/auth/login", &[], Some(&body)).await;
    assert_eq!(status, 200, "admin login must succeed");
    let set_cookie = header_value(&head, "set-cookie").expect("set-cookie header");
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

#[tokio::test]
async fn security_headers_are_applied_to_every_response() {
    let (addr, _) = spawn_server(GateConfig::default()).await;
    let (status, head, _) = send_raw(addr, "GET", "/", &[], None).await;
    assert_eq!(status, 200);
    assert_eq!(header_value(&head, "x-content-type-options"), Some("nosniff"));
    assert_eq!(header_value(&head, "x-frame-options"), Some("DENY"));
    assert_eq!(
        header_value(&head, "referrer-policy"),
        Some("strict-origin-when-cross-origin")
    );
    assert!(header_value(&head, "permissions-policy").is_some());
    assert!(header_value(&head, "x-request-id").is_some());
}

#[tokio::test]
async fn api_paths_get_cache_prevention_headers() {
    let (addr, _) = spawn_server(GateConfig::default()).await;
    let (status, head, _) = send_raw(addr, "GET", "/api/articles", &[], None).await;
    assert_eq!(status, 200);
    assert_eq!(
        header_value(&head, "cache-control"),
        Some("no-store, no-cache, must-revalidate")
    );
    assert_eq!(header_value(&head, "pragma"), Some("no-cache"));
}

#[tokio::test]
async fn admin_paths_get_noindex_and_private_cache_headers() {
    let (addr, _) = spawn_server(GateConfig::default()).await;
    let cookie = login_admin(addr).await;
    let (status, head, _) = send_raw(
        addr,
        "GET",
        "/admin/articles",
        &[("cookie", cookie.as_str())],
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(
        header_value(&head, "x-robots-tag"),
        Some("noindex, nofollow")
    );
    assert_eq!(
        header_value(&head, "cache-control"),
        Some("private, no-store, no-cache, must-revalidate")
    );
}

#[tokio::test]
async fn sensitive_path_probes_get_403_even_with_maintenance_disabled() {
    let (addr, _) = spawn_server(GateConfig::default()).await;
    for path in [
        "/.env",
        "/.git/config",
        "/package.json",
        "/package-lock.json",
        "/yarn.lock",
        "/backup/.env.production",
    ] {
        let (status, _, body) = send_raw(addr, "GET", path, &[], None).await;
        assert_eq!(status, 403, "{path}");
        assert_eq!(body, "Forbidden", "{path}");
    }
}

#[tokio::test]
async fn admin_routes_reject_anonymous_and_non_admin_requests() {
    let (addr, store) = spawn_server(GateConfig::default()).await;

    let (status, _, _) = send_raw(addr, "GET", "/admin/articles", &[], None).await;
    assert_eq!(status, 401);

    let (status, _, _) = send_raw(addr, "GET", "/api/admin/maintenance", &[], None).await;
    assert_eq!(status, 401);

    // An editor session is authenticated but still not an admin.
    store.users.lock().await.insert(
        "rio".to_string(),
        UserAccount {
            user_id: "u-rio".to_string(),
            username: "rio".to_string(),
            password_hmac: password_hmac(AUTH_SECRET, "editor pass").expect("hash"),
            role: Role::Editor,
            is_active: true,
        },
    );
    let body = json!({"username": "rio", "password": "editor pass"}).to_string();
    let (status, head, _) = send_raw(addr, "POST", "/api/auth/login", &[], Some(&body)).await;
    assert_eq!(status, 200);
    let cookie = header_value(&head, "set-cookie")
        .expect("set-cookie")
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string();
    let (status, _, _) = send_raw(
        addr,
        "GET",
        "/admin/articles",
        &[("cookie", cookie.as_str())],
        None,
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let (addr, _) = spawn_server(GateConfig::default()).await;
    let body = json!({"username": "mika", "password": "wrong"}).to_string();
    let (status, _, _) = send_raw(addr, "POST", "/api/auth/login", &[], Some(&body)).await;
    assert_eq!(status, 401);

    let body = json!({"username": "ghost", "password": "whatever"}).to_string();
    let (status, _, _) = send_raw(addr, "POST", "/api/auth/login", &[], Some(&body)).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn maintenance_toggle_gates_public_traffic_and_invalidation_is_immediate() {
    let (addr, _) = spawn_server(GateConfig::default()).await;
    let cookie = login_admin(addr).await;

    // Site is up.
    let (status, _, _) = send_raw(addr, "GET", "/news", &[], None).await;
    assert_eq!(status, 200);

    // Enable maintenance through the admin API.
    let body = json!({
        "is_enabled": true,
        "message": "patch 4.2 deploy",
        "allow_admin_access": true
    })
    .to_string();
    let (status, _, _) = send_raw(
        addr,
        "POST",
        "/api/admin/maintenance",
        &[("cookie", cookie.as_str())],
        Some(&body),
    )
    .await;
    assert_eq!(status, 200);

    // Cache was invalidated by the toggle: the very next request is gated.
    let (status, head, _) = send_raw(addr, "GET", "/news", &[], None).await;
    assert_eq!(status, 307);
    assert_eq!(header_value(&head, "location"), Some("/maintenance"));
    // Gate redirects still carry the security headers.
    assert_eq!(header_value(&head, "x-content-type-options"), Some("nosniff"));

    // The maintenance page itself stays reachable and shows the message.
    let (status, _, page) = send_raw(addr, "GET", "/maintenance", &[], None).await;
    assert_eq!(status, 200);
    assert!(page.contains("patch 4.2 deploy"));

    // Admin bypass: the admin session still reaches admin routes, and the
    // response carries the admin header set.
    let (status, head, _) = send_raw(
        addr,
        "GET",
        "/admin/articles",
        &[("cookie", cookie.as_str())],
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(
        header_value(&head, "x-robots-tag"),
        Some("noindex, nofollow")
    );
    assert_eq!(
        header_value(&head, "cache-control"),
        Some("private, no-store, no-cache, must-revalidate")
    );

    // Disable again; the next public request passes immediately.
    let body = json!({
        "is_enabled": false,
        "message": "",
        "allow_admin_access": true
    })
    .to_string();
    let (status, _, _) = send_raw(
        addr,
        "POST",
        "/api/admin/maintenance",
        &[("cookie", cookie.as_str())],
        Some(&body),
    )
    .await;
    assert_eq!(status, 200);
    let (status, _, _) = send_raw(addr, "GET", "/news", &[], None).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn maintenance_settings_response_carries_audit_fields() {
    let (addr, _) = spawn_server(GateConfig::default()).await;
    let cookie = login_admin(addr).await;

    let body = json!({
        "is_enabled": true,
        "message": "maintenance",
        "allow_admin_access": false
    })
    .to_string();
    let (status, _, response) = send_raw(
        addr,
        "POST",
        "/api/admin/maintenance",
        &[("cookie", cookie.as_str())],
        Some(&body),
    )
    .await;
    assert_eq!(status, 200);
    let parsed: Value = serde_json::from_str(&response).expect("settings json");
    assert_eq!(parsed["is_enabled"], Value::Bool(true));
    assert_eq!(parsed["enabled_by"], Value::String("u-mika".to_string()));
}

#[tokio::test]
async fn coming_soon_redirect_carries_the_encoded_origin_path() {
    // Launch in the far future relative to the request-time clock.
    let gate = GateConfig {
        coming_soon_launch: Utc
            .with_ymd_and_hms(2999, 1, 1, 0, 0, 0)
            .single()
            .expect("far future"),
        ..GateConfig::default()
    };
    let (addr, _) = spawn_server(gate).await;

    let (status, head, _) = send_raw(addr, "GET", "/guides", &[], None).await;
    assert_eq!(status, 307);
    assert_eq!(
        header_value(&head, "location"),
        Some("/coming-soon?page=%2Fguides")
    );

    let (status, _, page) = send_raw(addr, "GET", "/coming-soon?page=%2Fguides", &[], None).await;
    assert_eq!(status, 200);
    assert!(page.contains("/guides"));
}

#[tokio::test]
async fn launched_sections_serve_normally() {
    // Launch already in the past: the prefix list no longer matters.
    let gate = GateConfig {
        coming_soon_launch: Utc
            .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .single()
            .expect("past launch"),
        ..GateConfig::default()
    };
    let (addr, _) = spawn_server(gate).await;

    let (status, _, page) = send_raw(addr, "GET", "/news", &[], None).await;
    assert_eq!(status, 200);
    assert!(page.contains("Banner schedule"));

    let (status, _, _) = send_raw(addr, "GET", "/guides", &[], None).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn operational_endpoints_respond() {
    let (addr, _) = spawn_server(GateConfig::default()).await;

    let (status, _, body) = send_raw(addr, "GET", "/healthz", &[], None).await;
    assert_eq!(status, 200);
    assert_eq!(body, "ok");

    let (status, _, body) = send_raw(addr, "GET", "/readyz", &[], None).await;
    assert_eq!(status, 200);
    assert_eq!(body, "ready");

    let (status, _, metrics) = send_raw(addr, "GET", "/metrics", &[], None).await;
    assert_eq!(status, 200);
    assert!(metrics.contains("pityline_gate_pass_total"));
    assert!(metrics.contains("pityline_sensitive_probes_blocked_total"));
}

#[tokio::test]
async fn logout_deactivates_the_session() {
    let (addr, _) = spawn_server(GateConfig::default()).await;
    let cookie = login_admin(addr).await;

    let (status, _, _) = send_raw(
        addr,
        "POST",
        "/api/auth/logout",
        &[("cookie", cookie.as_str())],
        None,
    )
    .await;
    assert_eq!(status, 200);

    let (status, _, _) = send_raw(
        addr,
        "GET",
        "/admin/articles",
        &[("cookie", cookie.as_str())],
        None,
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn admin_article_upsert_validates_and_persists() {
    let (addr, store) = spawn_server(GateConfig::default()).await;
    let cookie = login_admin(addr).await;

    let article = json!({
        "slug": "new-event-guide",
        "title": "New event guide",
        "summary": "How to clear the event",
        "body": "Bring a healer.",
        "section": "guides",
        "published_at": "2026-03-15T09:00:00Z"
    })
    .to_string();
    let (status, _, _) = send_raw(
        addr,
        "POST",
        "/api/admin/articles",
        &[("cookie", cookie.as_str())],
        Some(&article),
    )
    .await;
    assert_eq!(status, 200);
    assert!(store.articles.lock().await.contains_key("new-event-guide"));

    let bad_slug = json!({
        "slug": "Bad Slug",
        "title": "x",
        "summary": "",
        "body": "",
        "section": "news",
        "published_at": "2026-03-15T09:00:00Z"
    })
    .to_string();
    let (status, _, _) = send_raw(
        addr,
        "POST",
        "/api/admin/articles",
        &[("cookie", cookie.as_str())],
        Some(&bad_slug),
    )
    .await;
    assert_eq!(status, 400);
}
