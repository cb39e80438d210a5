//! Built-in reporters.

use std::time::Duration;

use super::traits::PipesReporter;
use super::types::{FetchEmitTuple, PipesResult};

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl PipesReporter for NoOpReporter {
    fn report(&self, _tuple: &FetchEmitTuple, _result: &PipesResult, _elapsed: Duration) {}
}

/// Writes every report to the `tracing` log.
///
/// Successes go to `debug`, failures to `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter;

impl PipesReporter for LoggingReporter {
    fn report(&self, tuple: &FetchEmitTuple, result: &PipesResult, elapsed: Duration) {
        let status = result.status();
        if let Some(data) = result.emit_data() {
            tracing::debug!(
                id = tuple.id(),
                fetch_key = %tuple.fetch_key().fetch_key,
                status = %status,
                payload_bytes = data.estimated_size_bytes(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Tuple processed"
            );
        } else {
            tracing::info!(
                id = tuple.id(),
                fetch_key = %tuple.fetch_key().fetch_key,
                status = %status,
                cause = result.message().unwrap_or_default(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Tuple failed"
            );
        }
    }
}
