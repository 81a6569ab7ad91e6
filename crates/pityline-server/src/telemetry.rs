use std::sync::atomic::{AtomicU64, Ordering};

const METRIC_SUBSYSTEM: &str = "pityline";
const METRIC_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide gate counters. Cheap enough to bump on every request.
#[derive(Default)]
pub struct GateMetrics {
    pub gate_pass_total: AtomicU64,
    pub maintenance_redirects_total: AtomicU64,
    pub coming_soon_redirects_total: AtomicU64,
    pub settings_cache_hits: AtomicU64,
    pub settings_cache_misses: AtomicU64,
    pub settings_store_failures: AtomicU64,
    pub session_lookup_failures: AtomicU64,
    pub sensitive_probes_blocked_total: AtomicU64,
}

pub(crate) fn render_metrics(metrics: &GateMetrics) -> String {
    let mut body = String::new();
    for (name, value) in [
        ("gate_pass_total", &metrics.gate_pass_total),
        (
            "gate_maintenance_redirects_total",
            &metrics.maintenance_redirects_total,
        ),
        (
            "gate_coming_soon_redirects_total",
            &metrics.coming_soon_redirects_total,
        ),
        ("settings_cache_hits", &metrics.settings_cache_hits),
        ("settings_cache_misses", &metrics.settings_cache_misses),
        ("settings_store_failures", &metrics.settings_store_failures),
        ("session_lookup_failures", &metrics.session_lookup_failures),
        (
            "sensitive_probes_blocked_total",
            &metrics.sensitive_probes_blocked_total,
        ),
    ] {
        body.push_str(&format!(
            "pityline_{name}{{subsystem=\"{METRIC_SUBSYSTEM}\",version=\"{METRIC_VERSION}\"}} {}\n",
            value.load(Ordering::Relaxed)
        ));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_metrics_carry_every_counter_once() {
        let metrics = GateMetrics::default();
        metrics.gate_pass_total.store(7, Ordering::Relaxed);
        let body = render_metrics(&metrics);
        assert_eq!(body.lines().count(), 8);
        assert!(body.contains("pityline_gate_pass_total"));
        assert!(body.contains("} 7\n"));
    }
}
