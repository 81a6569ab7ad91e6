// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use pityline_model::{
    Article, ArticleSummary, MaintenanceSettings, Section, SessionRecord, UserAccount,
};

pub mod fake;
pub mod sqlite;

pub use fake::FakeStore;
pub use sqlite::SqliteStore;

#[derive(Debug)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for StoreError {}

/// Read/write access to the maintenance settings singleton.
///
/// The gate only ever calls `load_settings` (through the cache); `save_settings`
/// belongs to the admin toggle handler.
#[async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    async fn load_settings(&self) -> Result<MaintenanceSettings, StoreError>;
    async fn save_settings(&self, settings: &MaintenanceSettings) -> Result<(), StoreError>;
}

/// Session and account lookups. The gate resolves sessions read-only; the
/// auth handlers own the write paths.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, StoreError>;
    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError>;
    async fn deactivate_session(&self, token: &str) -> Result<(), StoreError>;
    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>, StoreError>;
    async fn upsert_user(&self, account: &UserAccount) -> Result<(), StoreError>;
}

/// Published content reads for the page and API handlers.
#[async_trait]
pub trait ArticleStore: Send + Sync + 'static {
    async fn list_articles(
        &self,
        section: Option<Section>,
        limit: usize,
    ) -> Result<Vec<ArticleSummary>, StoreError>;
    async fn find_article(&self, slug: &str) -> Result<Option<Article>, StoreError>;
    async fn upsert_article(&self, article: &Article) -> Result<(), StoreError>;
}
