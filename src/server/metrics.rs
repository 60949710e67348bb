use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all relay metrics
const PREFIX: &str = "player_relay";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // WebSocket Metrics
    pub static ref WS_CONNECTIONS_ACTIVE: Gauge = Gauge::new(
        format!("{PREFIX}_ws_connections_active"),
        "Number of connected WebSocket clients"
    ).expect("Failed to create ws_connections_active metric");

    pub static ref WS_EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_ws_events_total"), "Inbound client events by name"),
        &["event"]
    ).expect("Failed to create ws_events_total metric");

    pub static ref WS_EVENTS_DENIED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_ws_events_denied_total"),
            "Inbound client events rejected for missing credentials"
        ),
        &["event"]
    ).expect("Failed to create ws_events_denied_total metric");

    pub static ref WS_BROADCASTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_ws_broadcasts_total"), "Broadcasts to all clients by event"),
        &["event"]
    ).expect("Failed to create ws_broadcasts_total metric");

    pub static ref WS_SEND_FAILURES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_ws_send_failures_total"),
        "Messages that could not be queued for a client"
    ).expect("Failed to create ws_send_failures_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(WS_CONNECTIONS_ACTIVE.clone()));
    let _ = REGISTRY.register(Box::new(WS_EVENTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(WS_EVENTS_DENIED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(WS_BROADCASTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(WS_SEND_FAILURES_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method])
        .observe(duration.as_secs_f64());
}

pub fn record_connection_opened() {
    WS_CONNECTIONS_ACTIVE.inc();
}

pub fn record_connection_closed() {
    WS_CONNECTIONS_ACTIVE.dec();
}

/// Record an inbound event. Only call with known event names, the label set
/// must stay bounded.
pub fn record_inbound_event(event: &str) {
    WS_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_denied_event(event: &str) {
    WS_EVENTS_DENIED_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_broadcast(event: &str, failed: usize) {
    WS_BROADCASTS_TOTAL.with_label_values(&[event]).inc();
    if failed > 0 {
        WS_SEND_FAILURES_TOTAL.inc_by(failed as f64);
    }
}

pub fn record_send_failure() {
    WS_SEND_FAILURES_TOTAL.inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
