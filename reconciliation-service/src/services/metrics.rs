//! Prometheus metrics for reconciliation-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for HTTP requests by route and status.
pub static HTTP_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_http_requests_total",
        "Total number of HTTP requests",
        &["route", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS")
});

/// Histogram for the decode + reconcile + encode pipeline, by report format.
pub static RECONCILIATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "reconciliation_duration_seconds",
        "Reconciliation pipeline duration in seconds",
        &["format"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register RECONCILIATION_DURATION")
});

/// Counter for reconciliation runs by outcome.
pub static RECONCILIATION_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_runs_total",
        "Total number of reconciliation runs",
        &["outcome"]
    )
    .expect("Failed to register RECONCILIATION_RUNS")
});

/// Counter for reported discrepancies by status.
pub static DISCREPANCIES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_discrepancies_total",
        "Total number of reported discrepancies",
        &["status"]
    )
    .expect("Failed to register DISCREPANCIES")
});

/// Counter for rows read per source.
pub static ROWS_PROCESSED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_rows_processed_total",
        "Total number of spreadsheet rows read",
        &["source"]
    )
    .expect("Failed to register ROWS_PROCESSED")
});

/// Counter for rejected uploads.
pub static UPLOAD_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reconciliation_upload_failures_total",
        "Total number of rejected uploads",
        &["reason"]
    )
    .expect("Failed to register UPLOAD_FAILURES")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS);
    Lazy::force(&RECONCILIATION_DURATION);
    Lazy::force(&RECONCILIATION_RUNS);
    Lazy::force(&DISCREPANCIES);
    Lazy::force(&ROWS_PROCESSED);
    Lazy::force(&UPLOAD_FAILURES);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_http_request(route: &str, status: u16) {
    let status = status.to_string();
    HTTP_REQUESTS
        .with_label_values(&[route, status.as_str()])
        .inc();
}

pub fn record_reconciliation_duration(format: &str, duration_secs: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[format])
        .observe(duration_secs);
}

pub fn record_reconciliation_run(outcome: &str) {
    RECONCILIATION_RUNS.with_label_values(&[outcome]).inc();
}

pub fn record_discrepancies(status: &str, count: usize) {
    DISCREPANCIES
        .with_label_values(&[status])
        .inc_by(count as f64);
}

pub fn record_rows_processed(source: &str, count: usize) {
    ROWS_PROCESSED
        .with_label_values(&[source])
        .inc_by(count as f64);
}

pub fn record_upload_failure(reason: &str) {
    UPLOAD_FAILURES.with_label_values(&[reason]).inc();
}
