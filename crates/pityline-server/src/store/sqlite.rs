// SPDX-License-Identifier: Apache-2.0

use crate::store::{ArticleStore, SessionStore, SettingsStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pityline_model::{
    Article, ArticleSummary, MaintenanceSettings, Role, Section, SessionRecord, UserAccount,
    SETTINGS_KEY,
};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_millis(1000);

const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS maintenance_settings (
    key TEXT PRIMARY KEY,
    is_enabled INTEGER NOT NULL,
    message TEXT NOT NULL,
    estimated_end_time TEXT,
    allow_admin_access INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    enabled_by TEXT,
    disabled_by TEXT
);
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL,
    is_active INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hmac TEXT NOT NULL,
    role TEXT NOT NULL,
    is_active INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS articles (
    slug TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    body TEXT NOT NULL,
    section TEXT NOT NULL,
    published_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_articles_section_published
    ON articles(section, published_at DESC);
";

/// SQLite-backed store. Every operation opens its own connection inside
/// `spawn_blocking`; connections are never shared across requests, so the
/// sqlite mutex can stay off.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Create tables and seed the settings singleton row. Idempotent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let path = self.path.clone();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            conn.execute_batch(SCHEMA_SQL)
                .map_err(|e| StoreError(format!("schema bootstrap failed: {e}")))?;
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT OR IGNORE INTO maintenance_settings \
                 (key, is_enabled, message, estimated_end_time, allow_admin_access, \
                  created_at, updated_at, enabled_by, disabled_by) \
                 VALUES (?1, 0, '', NULL, 1, ?2, ?2, NULL, NULL)",
                params![SETTINGS_KEY, now],
            )
            .map_err(|e| StoreError(format!("settings seed failed: {e}")))?;
            Ok(())
        })
        .await
    }
}

fn open_rw(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| StoreError(format!("sqlite open failed: {e}")))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| StoreError(format!("busy_timeout failed: {e}")))?;
    Ok(conn)
}

async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError(format!("blocking task failed: {e}")))?
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError(format!("timestamp parse failed: {e}")))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.map(|s| parse_ts(&s)).transpose()
}

fn parse_role(raw: &str) -> Result<Role, StoreError> {
    Role::parse(raw).map_err(|e| StoreError(format!("role column invalid: {e}")))
}

fn parse_section(raw: &str) -> Result<Section, StoreError> {
    Section::parse(raw).map_err(|e| StoreError(format!("section column invalid: {e}")))
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn load_settings(&self) -> Result<MaintenanceSettings, StoreError> {
        let path = self.path.clone();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            type RawRow = (
                i64,
                String,
                Option<String>,
                i64,
                String,
                String,
                Option<String>,
                Option<String>,
            );
            let raw: RawRow = conn
                .query_row(
                    "SELECT is_enabled, message, estimated_end_time, allow_admin_access, \
                     created_at, updated_at, enabled_by, disabled_by \
                     FROM maintenance_settings WHERE key = ?1",
                    params![SETTINGS_KEY],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                            row.get(7)?,
                        ))
                    },
                )
                .map_err(|e| StoreError(format!("settings read failed: {e}")))?;
            Ok(MaintenanceSettings {
                is_enabled: raw.0 != 0,
                message: raw.1,
                estimated_end_time: parse_opt_ts(raw.2)?,
                allow_admin_access: raw.3 != 0,
                created_at: parse_ts(&raw.4)?,
                updated_at: parse_ts(&raw.5)?,
                enabled_by: raw.6,
                disabled_by: raw.7,
            })
        })
        .await
    }

    async fn save_settings(&self, settings: &MaintenanceSettings) -> Result<(), StoreError> {
        let path = self.path.clone();
        let settings = settings.clone();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            conn.execute(
                "INSERT OR REPLACE INTO maintenance_settings \
                 (key, is_enabled, message, estimated_end_time, allow_admin_access, \
                  created_at, updated_at, enabled_by, disabled_by) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    SETTINGS_KEY,
                    settings.is_enabled as i64,
                    settings.message,
                    settings.estimated_end_time.map(|t| t.to_rfc3339()),
                    settings.allow_admin_access as i64,
                    settings.created_at.to_rfc3339(),
                    settings.updated_at.to_rfc3339(),
                    settings.enabled_by,
                    settings.disabled_by,
                ],
            )
            .map_err(|e| StoreError(format!("settings write failed: {e}")))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let path = self.path.clone();
        let token = token.to_string();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            let raw: Option<(String, String, String, i64)> = conn
                .query_row(
                    "SELECT token, user_id, role, is_active FROM sessions WHERE token = ?1",
                    params![token],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()
                .map_err(|e| StoreError(format!("session read failed: {e}")))?;
            raw.map(|(token, user_id, role, is_active)| {
                Ok(SessionRecord {
                    token,
                    user_id,
                    role: parse_role(&role)?,
                    is_active: is_active != 0,
                })
            })
            .transpose()
        })
        .await
    }

    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.path.clone();
        let record = record.clone();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            conn.execute(
                "INSERT OR REPLACE INTO sessions (token, user_id, role, is_active) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.token,
                    record.user_id,
                    record.role.as_str(),
                    record.is_active as i64
                ],
            )
            .map_err(|e| StoreError(format!("session write failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn deactivate_session(&self, token: &str) -> Result<(), StoreError> {
        let path = self.path.clone();
        let token = token.to_string();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            conn.execute(
                "UPDATE sessions SET is_active = 0 WHERE token = ?1",
                params![token],
            )
            .map_err(|e| StoreError(format!("session deactivate failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        let path = self.path.clone();
        let username = username.to_string();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            let raw: Option<(String, String, String, String, i64)> = conn
                .query_row(
                    "SELECT user_id, username, password_hmac, role, is_active \
                     FROM users WHERE username = ?1",
                    params![username],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| StoreError(format!("user read failed: {e}")))?;
            raw.map(|(user_id, username, password_hmac, role, is_active)| {
                Ok(UserAccount {
                    user_id,
                    username,
                    password_hmac,
                    role: parse_role(&role)?,
                    is_active: is_active != 0,
                })
            })
            .transpose()
        })
        .await
    }

    async fn upsert_user(&self, account: &UserAccount) -> Result<(), StoreError> {
        let path = self.path.clone();
        let account = account.clone();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            conn.execute(
                "INSERT OR REPLACE INTO users \
                 (user_id, username, password_hmac, role, is_active) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    account.user_id,
                    account.username,
                    account.password_hmac,
                    account.role.as_str(),
                    account.is_active as i64
                ],
            )
            .map_err(|e| StoreError(format!("user write failed: {e}")))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn list_articles(
        &self,
        section: Option<Section>,
        limit: usize,
    ) -> Result<Vec<ArticleSummary>, StoreError> {
        let path = self.path.clone();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            let mut rows: Vec<(String, String, String, String, String)> = Vec::new();
            let map = |row: &rusqlite::Row<'_>| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            };
            if let Some(section) = section {
                let mut stmt = conn
                    .prepare(
                        "SELECT slug, title, summary, section, published_at FROM articles \
                         WHERE section = ?1 ORDER BY published_at DESC LIMIT ?2",
                    )
                    .map_err(|e| StoreError(format!("article query failed: {e}")))?;
                let found = stmt
                    .query_map(params![section.as_str(), limit as i64], map)
                    .map_err(|e| StoreError(format!("article query failed: {e}")))?;
                for row in found {
                    rows.push(row.map_err(|e| StoreError(format!("article row failed: {e}")))?);
                }
            } else {
                let mut stmt = conn
                    .prepare(
                        "SELECT slug, title, summary, section, published_at FROM articles \
                         ORDER BY published_at DESC LIMIT ?1",
                    )
                    .map_err(|e| StoreError(format!("article query failed: {e}")))?;
                let found = stmt
                    .query_map(params![limit as i64], map)
                    .map_err(|e| StoreError(format!("article query failed: {e}")))?;
                for row in found {
                    rows.push(row.map_err(|e| StoreError(format!("article row failed: {e}")))?);
                }
            }
            rows.into_iter()
                .map(|(slug, title, summary, section, published_at)| {
                    Ok(ArticleSummary {
                        slug,
                        title,
                        summary,
                        section: parse_section(&section)?,
                        published_at: parse_ts(&published_at)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn find_article(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        let path = self.path.clone();
        let slug = slug.to_string();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            let raw: Option<(String, String, String, String, String, String)> = conn
                .query_row(
                    "SELECT slug, title, summary, body, section, published_at \
                     FROM articles WHERE slug = ?1",
                    params![slug],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| StoreError(format!("article read failed: {e}")))?;
            raw.map(|(slug, title, summary, body, section, published_at)| {
                Ok(Article {
                    slug,
                    title,
                    summary,
                    body,
                    section: parse_section(&section)?,
                    published_at: parse_ts(&published_at)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn upsert_article(&self, article: &Article) -> Result<(), StoreError> {
        let path = self.path.clone();
        let article = article.clone();
        run_blocking(move || {
            let conn = open_rw(&path)?;
            conn.execute(
                "INSERT OR REPLACE INTO articles \
                 (slug, title, summary, body, section, published_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    article.slug,
                    article.title,
                    article.summary,
                    article.body,
                    article.section.as_str(),
                    article.published_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError(format!("article write failed: {e}")))?;
            Ok(())
        })
        .await
    }
}
