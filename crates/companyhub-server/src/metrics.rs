//! Prometheus metrics for CompanyHub.
//!
//! - HTTP request metrics (count, latency)
//! - Local cache metrics (hits, misses, entries)
//! - Event log metrics (published, failed, applied, skipped, reconnects)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Cache metrics
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_ENTRIES: &str = "cache_entries";

    // Event log metrics
    pub const EVENTS_PUBLISHED_TOTAL: &str = "events_published_total";
    pub const EVENTS_PUBLISH_FAILURES_TOTAL: &str = "events_publish_failures_total";
    pub const EVENTS_APPLIED_TOTAL: &str = "events_applied_total";
    pub const EVENTS_SKIPPED_TOTAL: &str = "events_skipped_total";
    pub const CONSUMER_RECONNECTS_TOTAL: &str = "event_consumer_reconnects_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics is served by the app router
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

// =============================================================================
// HTTP Metrics
// =============================================================================

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let status_class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };

    let normalized_path = normalize_path(path);

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => normalized_path.clone(),
        "status_class" => status_class
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => normalized_path
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Cache Metrics
// =============================================================================

pub fn record_cache_hit() {
    counter!(names::CACHE_HITS_TOTAL).increment(1);
}

pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

pub fn set_cache_entries(count: usize) {
    gauge!(names::CACHE_ENTRIES).set(count as f64);
}

// =============================================================================
// Event Log Metrics
// =============================================================================

pub fn record_event_published(action: &'static str) {
    counter!(names::EVENTS_PUBLISHED_TOTAL, "action" => action).increment(1);
}

pub fn record_event_publish_failure(action: &'static str) {
    counter!(names::EVENTS_PUBLISH_FAILURES_TOTAL, "action" => action).increment(1);
}

pub fn record_event_applied(action: &'static str) {
    counter!(names::EVENTS_APPLIED_TOTAL, "action" => action).increment(1);
}

pub fn record_event_skipped() {
    counter!(names::EVENTS_SKIPPED_TOTAL).increment(1);
}

pub fn record_consumer_reconnect() {
    counter!(names::CONSUMER_RECONNECTS_TOTAL).increment(1);
}

// =============================================================================
// Helpers
// =============================================================================

/// Replaces id-like path segments with `{id}` to bound label cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|part| if is_likely_id(part) { "{id}" } else { part })
        .collect::<Vec<_>>()
        .join("/")
}

/// Check if a string looks like an ID (UUID or numeric).
fn is_likely_id(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4 {
        return true;
    }
    if s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        return true;
    }
    s.chars().all(|c| c.is_ascii_digit())
}
