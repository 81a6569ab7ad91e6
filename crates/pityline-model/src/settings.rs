use crate::role::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed key of the one-and-only settings row. Reads and writes always
/// target this key; the row is created at schema bootstrap and never
/// deleted.
pub const SETTINGS_KEY: &str = "singleton";

pub const MESSAGE_MAX_LEN: usize = 2048;

/// The maintenance configuration singleton.
///
/// `is_enabled` is the global kill switch for public traffic;
/// `allow_admin_access` decides whether admin sessions may bypass the gate
/// while it is down. `estimated_end_time` is display-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceSettings {
    pub is_enabled: bool,
    pub message: String,
    pub estimated_end_time: Option<DateTime<Utc>>,
    pub allow_admin_access: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub enabled_by: Option<String>,
    pub disabled_by: Option<String>,
}

impl MaintenanceSettings {
    /// Maintenance-off value used both to seed the singleton row and as the
    /// fail-open substitute when the store is unreachable.
    #[must_use]
    pub fn disabled_at(now: DateTime<Utc>) -> Self {
        Self {
            is_enabled: false,
            message: String::new(),
            estimated_end_time: None,
            allow_admin_access: true,
            created_at: now,
            updated_at: now,
            enabled_by: None,
            disabled_by: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.message.len() > MESSAGE_MAX_LEN {
            return Err(ValidationError(format!(
                "maintenance message exceeds max length {MESSAGE_MAX_LEN}"
            )));
        }
        Ok(())
    }

    /// Apply an admin toggle, stamping `updated_at` and the audit actor for
    /// the direction of the toggle.
    pub fn apply_update(&mut self, update: SettingsUpdate, actor: &str, now: DateTime<Utc>) {
        self.message = update.message;
        self.estimated_end_time = update.estimated_end_time;
        self.allow_admin_access = update.allow_admin_access;
        if update.is_enabled {
            self.enabled_by = Some(actor.to_string());
        } else {
            self.disabled_by = Some(actor.to_string());
        }
        self.is_enabled = update.is_enabled;
        self.updated_at = now;
    }
}

/// Admin-supplied toggle payload. Audit fields and timestamps are stamped
/// server-side, never accepted from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub is_enabled: bool,
    pub message: String,
    #[serde(default)]
    pub estimated_end_time: Option<DateTime<Utc>>,
    pub allow_admin_access: bool,
}
