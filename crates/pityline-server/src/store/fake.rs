// SPDX-License-Identifier: Apache-2.0

use crate::store::{ArticleStore, SessionStore, SettingsStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use pityline_model::{
    Article, ArticleSummary, MaintenanceSettings, Section, SessionRecord, UserAccount,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// In-memory store double for tests. Counters and failure switches are
/// public so tests can assert call patterns and inject outages after the
/// store is shared.
pub struct FakeStore {
    pub settings: Mutex<MaintenanceSettings>,
    pub sessions: Mutex<HashMap<String, SessionRecord>>,
    pub users: Mutex<HashMap<String, UserAccount>>,
    pub articles: Mutex<HashMap<String, Article>>,
    pub settings_load_calls: AtomicU64,
    pub session_find_calls: AtomicU64,
    pub fail_settings: AtomicBool,
    pub fail_sessions: AtomicBool,
    pub slow_read: AtomicBool,
    pub slow_read_delay: Duration,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self {
            settings: Mutex::new(MaintenanceSettings::disabled_at(Utc::now())),
            sessions: Mutex::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
            articles: Mutex::new(HashMap::new()),
            settings_load_calls: AtomicU64::new(0),
            session_find_calls: AtomicU64::new(0),
            fail_settings: AtomicBool::new(false),
            fail_sessions: AtomicBool::new(false),
            slow_read: AtomicBool::new(false),
            slow_read_delay: Duration::from_millis(200),
        }
    }
}

impl FakeStore {
    async fn maybe_stall(&self) {
        if self.slow_read.load(Ordering::Relaxed) {
            tokio::time::sleep(self.slow_read_delay).await;
        }
    }
}

#[async_trait]
impl SettingsStore for FakeStore {
    async fn load_settings(&self) -> Result<MaintenanceSettings, StoreError> {
        self.settings_load_calls.fetch_add(1, Ordering::Relaxed);
        self.maybe_stall().await;
        if self.fail_settings.load(Ordering::Relaxed) {
            return Err(StoreError("settings store unavailable".to_string()));
        }
        Ok(self.settings.lock().await.clone())
    }

    async fn save_settings(&self, settings: &MaintenanceSettings) -> Result<(), StoreError> {
        if self.fail_settings.load(Ordering::Relaxed) {
            return Err(StoreError("settings store unavailable".to_string()));
        }
        *self.settings.lock().await = settings.clone();
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FakeStore {
    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        self.session_find_calls.fetch_add(1, Ordering::Relaxed);
        self.maybe_stall().await;
        if self.fail_sessions.load(Ordering::Relaxed) {
            return Err(StoreError("session store unavailable".to_string()));
        }
        Ok(self.sessions.lock().await.get(token).cloned())
    }

    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn deactivate_session(&self, token: &str) -> Result<(), StoreError> {
        if let Some(record) = self.sessions.lock().await.get_mut(token) {
            record.is_active = false;
        }
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.users.lock().await.get(username).cloned())
    }

    async fn upsert_user(&self, account: &UserAccount) -> Result<(), StoreError> {
        self.users
            .lock()
            .await
            .insert(account.username.clone(), account.clone());
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for FakeStore {
    async fn list_articles(
        &self,
        section: Option<Section>,
        limit: usize,
    ) -> Result<Vec<ArticleSummary>, StoreError> {
        let articles = self.articles.lock().await;
        let mut rows: Vec<ArticleSummary> = articles
            .values()
            .filter(|a| section.map_or(true, |s| a.section == s))
            .cloned()
            .map(ArticleSummary::from)
            .collect();
        rows.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn find_article(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        Ok(self.articles.lock().await.get(slug).cloned())
    }

    async fn upsert_article(&self, article: &Article) -> Result<(), StoreError> {
        self.articles
            .lock()
            .await
            .insert(article.slug.clone(), article.clone());
        Ok(())
    }
}
