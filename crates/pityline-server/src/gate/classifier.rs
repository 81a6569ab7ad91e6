use crate::config::GateConfig;
use chrono::{DateTime, Utc};

/// Gate-relevant category of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Reachable even while maintenance is active. Keeps the system
    /// recoverable: the maintenance page, the toggle API, and auth routes
    /// live here.
    AlwaysAllowed,
    /// Behind the coming-soon page until the launch date passes.
    ComingSoonGated,
    /// Admin UI and admin API surface.
    AdminScoped,
    Ordinary,
}

/// Classify a raw request path.
///
/// Matching is raw prefix comparison, nothing else: trailing slashes and
/// case differences are NOT folded, so `/Guides` and `/guides/` classify
/// independently of `/guides`. Known sharp edge, kept to match the gate's
/// documented behavior and pinned by tests below.
///
/// The coming-soon check runs first and is time-bounded: once `now`
/// reaches the launch date these paths are ordinary forever, whatever the
/// prefix list says.
#[must_use]
pub fn classify(path: &str, now: DateTime<Utc>, cfg: &GateConfig) -> PathClass {
    if now < cfg.coming_soon_launch
        && cfg.coming_soon_prefixes.iter().any(|p| path.starts_with(p))
    {
        return PathClass::ComingSoonGated;
    }
    if cfg
        .always_allowed_prefixes
        .iter()
        .any(|p| path.starts_with(p))
    {
        return PathClass::AlwaysAllowed;
    }
    if cfg.admin_prefixes.iter().any(|p| path.starts_with(p)) {
        return PathClass::AdminScoped;
    }
    PathClass::Ordinary
}
