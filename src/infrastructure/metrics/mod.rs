//! Prometheus metrics for the sync queue.
//!
//! - Queue metrics (enqueued, pending, exhausted)
//! - Drain metrics (passes, duration, synced and failed operations)
//! - Remote endpoint latency
//! - Connectivity status

mod helpers;

pub use helpers::{encode_metrics, ConnectivityMetrics, DrainMetrics, QueueMetrics, RemoteMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    Histogram, HistogramVec, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "mailsync";

lazy_static! {
    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Operations appended to the queue, by kind
    pub static ref OPERATIONS_ENQUEUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_operations_enqueued_total", METRIC_PREFIX),
        "Total operations enqueued",
        &["kind"]
    ).unwrap();

    /// Operations currently waiting in the queue
    pub static ref OPERATIONS_PENDING: IntGauge = register_int_gauge!(
        format!("{}_operations_pending", METRIC_PREFIX),
        "Number of operations currently queued"
    ).unwrap();

    /// Exhausted operations encountered during a drain (skipped or dropped)
    pub static ref OPERATIONS_EXHAUSTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_operations_exhausted_total", METRIC_PREFIX),
        "Total exhausted operations encountered during drains",
        &["action"]
    ).unwrap();

    // ============================================================================
    // Drain Metrics
    // ============================================================================

    /// Operations confirmed by the remote side, by kind
    pub static ref OPERATIONS_SYNCED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_operations_synced_total", METRIC_PREFIX),
        "Total operations successfully synced",
        &["kind"]
    ).unwrap();

    /// Failed dispatch attempts, by kind
    pub static ref OPERATIONS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_operations_failed_total", METRIC_PREFIX),
        "Total failed dispatch attempts",
        &["kind"]
    ).unwrap();

    /// Drain passes by outcome (complete, partial, cancelled, error)
    pub static ref DRAINS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_drains_total", METRIC_PREFIX),
        "Total drain passes",
        &["outcome"]
    ).unwrap();

    /// Wall time of a drain pass, including backoff delays
    pub static ref DRAIN_DURATION: Histogram = register_histogram!(
        format!("{}_drain_duration_seconds", METRIC_PREFIX),
        "Drain pass duration in seconds",
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    // ============================================================================
    // Remote Metrics
    // ============================================================================

    /// Remote endpoint call latency
    pub static ref REMOTE_CALL_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_remote_call_latency_seconds", METRIC_PREFIX),
        "Remote endpoint call latency in seconds",
        &["call"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // ============================================================================
    // Connectivity Metrics
    // ============================================================================

    /// Connectivity status (1 = available, 0 = offline)
    pub static ref CONNECTIVITY_STATUS: IntGauge = register_int_gauge!(
        format!("{}_connectivity_status", METRIC_PREFIX),
        "Network connectivity status (1=available, 0=offline)"
    ).unwrap();
}
