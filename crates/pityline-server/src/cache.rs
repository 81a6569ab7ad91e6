use crate::store::SettingsStore;
use crate::telemetry::GateMetrics;
use chrono::Utc;
use pityline_model::MaintenanceSettings;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::warn;

struct CachedSettings {
    value: MaintenanceSettings,
    captured_at: Instant,
}

/// Short-TTL snapshot of the maintenance settings singleton.
///
/// One instance lives on `AppState` and is shared between the gate (reads)
/// and the admin toggle handler (invalidation after writes); there is no
/// module-level or otherwise implicit cache state. Concurrent misses may
/// each hit the store; the last write wins the slot, which is harmless for
/// an idempotent single-row read.
pub struct SettingsCache {
    ttl: Duration,
    store_timeout: Duration,
    slot: Mutex<Option<CachedSettings>>,
    metrics: Arc<GateMetrics>,
}

impl SettingsCache {
    #[must_use]
    pub fn new(ttl: Duration, store_timeout: Duration, metrics: Arc<GateMetrics>) -> Self {
        Self {
            ttl,
            store_timeout,
            slot: Mutex::new(None),
            metrics,
        }
    }

    /// Current settings, served from the snapshot while it is fresh.
    ///
    /// Store failures and timeouts degrade to the maintenance-off value
    /// instead of propagating: a storage outage must not lock the whole
    /// site behind the maintenance page. The degraded value is not cached,
    /// so the next request retries the store.
    pub async fn current(&self, store: &dyn SettingsStore) -> MaintenanceSettings {
        {
            let slot = self.slot.lock().await;
            if let Some(cached) = slot.as_ref() {
                if cached.captured_at.elapsed() < self.ttl {
                    self.metrics.settings_cache_hits.fetch_add(1, Ordering::Relaxed);
                    return cached.value.clone();
                }
            }
        }
        self.metrics
            .settings_cache_misses
            .fetch_add(1, Ordering::Relaxed);
        match timeout(self.store_timeout, store.load_settings()).await {
            Ok(Ok(value)) => {
                let mut slot = self.slot.lock().await;
                *slot = Some(CachedSettings {
                    value: value.clone(),
                    captured_at: Instant::now(),
                });
                value
            }
            Ok(Err(e)) => {
                self.metrics
                    .settings_store_failures
                    .fetch_add(1, Ordering::Relaxed);
                warn!("settings read failed, treating maintenance as disabled: {e}");
                MaintenanceSettings::disabled_at(Utc::now())
            }
            Err(_) => {
                self.metrics
                    .settings_store_failures
                    .fetch_add(1, Ordering::Relaxed);
                warn!("settings read timed out, treating maintenance as disabled");
                MaintenanceSettings::disabled_at(Utc::now())
            }
        }
    }

    pub async fn is_enabled(&self, store: &dyn SettingsStore) -> bool {
        self.current(store).await.is_enabled
    }

    /// Drop the snapshot. Must be called right after every settings
    /// mutation so the next request observes the new state without waiting
    /// out the TTL.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
