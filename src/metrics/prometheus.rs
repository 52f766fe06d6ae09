use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus HTTP exporter on :9000.
/// After this call, any metrics recorded via the `metrics` crate
/// macros (counter!, histogram!) are automatically exported at /metrics.
pub fn init_metrics_server() -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], 9000))
        .install()?;
    Ok(())
}

// ── Hydration metrics ────────────────────────────────────────────

pub fn record_poll(class: &str, outcome: &str) {
    counter!("hydration_polls_total", "class" => class.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

pub fn record_poll_latency(class: &str, latency_ms: f64) {
    histogram!("hydration_poll_latency_ms", "class" => class.to_string()).record(latency_ms);
}

// ── Store metrics ────────────────────────────────────────────────

pub fn record_store_apply(class: &str) {
    counter!("store_updates_applied_total", "class" => class.to_string()).increment(1);
}

/// An update lost the race against a newer fetch and was discarded.
pub fn record_stale_drop(class: &str) {
    counter!("store_updates_stale_total", "class" => class.to_string()).increment(1);
}

// ── Book feed metrics ────────────────────────────────────────────

pub fn record_book_frame(market: &str) {
    counter!("book_frames_total", "market" => market.to_string()).increment(1);
}

/// Sequence gap detected; a snapshot refetch was forced.
pub fn record_book_resync(market: &str, reason: &str) {
    counter!("book_resyncs_total", "market" => market.to_string(), "reason" => reason.to_string())
        .increment(1);
}

// ── Submission metrics ───────────────────────────────────────────

pub fn record_submission(market: &str, outcome: &str) {
    counter!("order_submissions_total", "market" => market.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}
