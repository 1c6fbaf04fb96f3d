//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the walk-in queue server:
//! - HTTP request metrics (latency, counts, auth failures)
//! - WebSocket connection metrics
//! - Ticket counters and the waiting-line gauge (collected on scrape)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::{error, warn};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "walkin_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .expect("valid metric definition")
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("walkin_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("valid metric definition")
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "walkin_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .expect("valid metric definition")
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("walkin_auth_failures_total", "Total authentication failures"),
        &["reason"],
    )
    .expect("valid metric definition")
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "walkin_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .expect("valid metric definition")
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "walkin_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .expect("valid metric definition")
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("walkin_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .expect("valid metric definition")
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "walkin_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .expect("valid metric definition")
});

// =============================================================================
// Ticket Metrics
// =============================================================================

/// Tickets issued total.
pub static TICKETS_ISSUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "walkin_tickets_issued_total",
        "Total tickets issued since startup",
    )
    .expect("valid metric definition")
});

/// Queue advances that called a ticket.
pub static TICKETS_CALLED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "walkin_tickets_called_total",
        "Total tickets called since startup",
    )
    .expect("valid metric definition")
});

/// Tickets removed by an admin.
pub static TICKETS_REMOVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "walkin_tickets_removed_total",
        "Total tickets removed by an admin since startup",
    )
    .expect("valid metric definition")
});

/// Tickets currently waiting (collected dynamically).
pub static QUEUE_WAITING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("walkin_queue_waiting", "Tickets currently waiting")
        .expect("valid metric definition")
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // HTTP
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(AUTH_FAILURES_TOTAL.clone()),
        // WebSocket
        Box::new(WS_CONNECTIONS_ACTIVE.clone()),
        Box::new(WS_CONNECTIONS_TOTAL.clone()),
        Box::new(WS_MESSAGES_SENT.clone()),
        Box::new(WS_LAG_EVENTS.clone()),
        // Tickets
        Box::new(TICKETS_ISSUED_TOTAL.clone()),
        Box::new(TICKETS_CALLED_TOTAL.clone()),
        Box::new(TICKETS_REMOVED_TOTAL.clone()),
        Box::new(QUEUE_WAITING.clone()),
    ];

    for metric in metrics {
        if let Err(e) = registry.register(metric) {
            error!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the store at scrape time.
pub fn collect_dynamic_metrics(state: &AppState) {
    match state.queue().waiting_count() {
        Ok(count) => QUEUE_WAITING.set(count),
        Err(e) => warn!("Failed to count waiting tickets: {}", e),
    }
}

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("uuid pattern is valid")
});

static NUMERIC_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("numeric pattern is valid"));

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_PATTERN.replace_all(path, "{id}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
