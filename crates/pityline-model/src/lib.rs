#![forbid(unsafe_code)]
//! Pityline model SSOT.
//!
//! Domain types shared by the server: user roles, the maintenance settings
//! singleton, session records, and the minimal article shape served by the
//! content handlers.

mod article;
mod role;
mod session;
mod settings;

pub use article::{parse_slug, Article, ArticleSummary, Section, SLUG_MAX_LEN, TITLE_MAX_LEN};
pub use role::{Role, ValidationError};
pub use session::{SessionRecord, SessionToken, UserAccount, TOKEN_MAX_LEN, USERNAME_MAX_LEN};
pub use settings::{MaintenanceSettings, SettingsUpdate, MESSAGE_MAX_LEN, SETTINGS_KEY};

pub const CRATE_NAME: &str = "pityline-model";
