//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Fetch workers (tuples processed, processing duration)
//! - Emit workers (payloads emitted by result)
//! - Shutdown (stop signals injected per queue)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Fetch Metrics
// =============================================================================

/// Tuples processed total by result status.
pub static TUPLES_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docpipe_tuples_processed_total", "Total tuples processed"),
        &["status"], // PipesStatus::as_str()
    )
    .unwrap()
});

/// Time from taking a tuple to reporting its result, in seconds.
pub static PROCESSING_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "docpipe_processing_duration_seconds",
            "Duration of fetch, parse and hand-off per tuple",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Emit Metrics
// =============================================================================

/// Payloads handed to the emitter by result.
pub static EMITS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docpipe_emits_total", "Total payloads handed to the emitter"),
        &["result"], // "success", "failed", "fatal"
    )
    .unwrap()
});

// =============================================================================
// Shutdown Metrics
// =============================================================================

/// Stop signals injected by queue.
pub static STOP_SIGNALS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("docpipe_stop_signals_total", "Total stop signals injected"),
        &["queue"], // "fetch", "emit"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TUPLES_PROCESSED.clone()),
        Box::new(PROCESSING_DURATION.clone()),
        Box::new(EMITS_TOTAL.clone()),
        Box::new(STOP_SIGNALS.clone()),
    ]
}
