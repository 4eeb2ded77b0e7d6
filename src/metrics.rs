use lazy_static::lazy_static;
use prometheus::{
    Encoder, Gauge, Histogram, IntCounter, IntCounterVec, TextEncoder, register_gauge,
    register_histogram, register_int_counter, register_int_counter_vec,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "mermaid_requests_total",
        "Total number of requests by transport and operation",
        &["transport", "operation"]
    )
    .unwrap();
    pub static ref RATE_LIMITED: IntCounterVec = register_int_counter_vec!(
        "mermaid_rate_limited_total",
        "Requests denied by the rate limiter",
        &["transport"]
    )
    .unwrap();
    pub static ref RENDER_FAILURES: IntCounter = register_int_counter!(
        "mermaid_render_failures_total",
        "Renders that failed inside the engine"
    )
    .unwrap();
    pub static ref RENDER_LATENCY: Histogram = register_histogram!(
        "mermaid_render_latency_seconds",
        "Engine render latency in seconds"
    )
    .unwrap();
    pub static ref RATE_LIMIT_ENTRIES: Gauge = register_gauge!(
        "mermaid_rate_limit_entries",
        "Identifiers currently tracked by the rate limiter"
    )
    .unwrap();
}

/// Prometheus text exposition of the default registry.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        log::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
