//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::operation::OperationKind;

use super::{
    CONNECTIVITY_STATUS, DRAINS_TOTAL, DRAIN_DURATION, OPERATIONS_ENQUEUED_TOTAL,
    OPERATIONS_EXHAUSTED_TOTAL, OPERATIONS_FAILED_TOTAL, OPERATIONS_PENDING,
    OPERATIONS_SYNCED_TOTAL, REMOTE_CALL_LATENCY,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording queue store metrics
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn record_enqueued(kind: OperationKind) {
        OPERATIONS_ENQUEUED_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn set_pending(count: usize) {
        OPERATIONS_PENDING.set(count as i64);
    }
}

/// Helper struct for recording drain metrics
pub struct DrainMetrics;

impl DrainMetrics {
    pub fn record_synced(kind: OperationKind) {
        OPERATIONS_SYNCED_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn record_failed(kind: OperationKind) {
        OPERATIONS_FAILED_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    /// Exhausted record left in place
    pub fn record_skipped() {
        OPERATIONS_EXHAUSTED_TOTAL.with_label_values(&["skipped"]).inc();
    }

    /// Exhausted record removed from the queue
    pub fn record_dropped() {
        OPERATIONS_EXHAUSTED_TOTAL.with_label_values(&["dropped"]).inc();
    }

    pub fn record_pass(outcome: &str, duration_secs: f64) {
        DRAINS_TOTAL.with_label_values(&[outcome]).inc();
        DRAIN_DURATION.observe(duration_secs);
    }
}

/// Helper struct for recording remote endpoint metrics
pub struct RemoteMetrics;

impl RemoteMetrics {
    pub fn record_latency(call: &str, latency_secs: f64) {
        REMOTE_CALL_LATENCY
            .with_label_values(&[call])
            .observe(latency_secs);
    }
}

/// Helper struct for recording connectivity metrics
pub struct ConnectivityMetrics;

impl ConnectivityMetrics {
    pub fn set_available(available: bool) {
        CONNECTIVITY_STATUS.set(if available { 1 } else { 0 });
    }
}
