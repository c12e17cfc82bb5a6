//! Prometheus metrics for composition runs.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use duet_models::FailureKind;

/// Install the Prometheus recorder with an HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus exporter: {}", e))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const RUNS_STARTED_TOTAL: &str = "duet_runs_started_total";
    pub const RUNS_COMPLETED_TOTAL: &str = "duet_runs_completed_total";
    pub const RUNS_FAILED_TOTAL: &str = "duet_runs_failed_total";
    pub const RUN_DURATION_SECONDS: &str = "duet_run_duration_seconds";
    pub const STEP_DURATION_SECONDS: &str = "duet_step_duration_seconds";
    pub const THUMBNAILS_SKIPPED_TOTAL: &str = "duet_thumbnails_skipped_total";
}

pub fn record_run_started() {
    counter!(names::RUNS_STARTED_TOTAL).increment(1);
}

pub fn record_run_completed(elapsed: Duration) {
    counter!(names::RUNS_COMPLETED_TOTAL).increment(1);
    histogram!(names::RUN_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn record_run_failed(kind: FailureKind, elapsed: Duration) {
    let labels = [("kind", kind.as_str().to_string())];
    counter!(names::RUNS_FAILED_TOTAL, &labels).increment(1);
    histogram!(names::RUN_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

/// Record how long a pipeline step took.
pub fn record_step_duration(step: &str, elapsed: Duration) {
    let labels = [("step", step.to_string())];
    histogram!(names::STEP_DURATION_SECONDS, &labels).record(elapsed.as_secs_f64());
}

pub fn record_thumbnail_skipped() {
    counter!(names::THUMBNAILS_SKIPPED_TOTAL).increment(1);
}
