//! Emit worker loop.

use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::metrics;

use super::pipeline::{PipelineError, Shared, WorkerExit};
use super::types::{EmitMessage, WorkerRole};

/// Runs one emit worker to completion.
pub(super) async fn run(worker_id: usize, shared: Arc<Shared>) -> WorkerExit {
    let result = emit_loop(worker_id, &shared).await;
    WorkerExit {
        role: WorkerRole::Emit,
        worker_id,
        result,
    }
}

async fn emit_loop(worker_id: usize, shared: &Shared) -> Result<(), PipelineError> {
    debug!(
        worker_id,
        emitter = shared.emitter.name(),
        "Emit worker started"
    );

    loop {
        let message = {
            let mut rx = shared.emit_rx.lock().await;
            rx.recv().await
        };

        let data = match message {
            Some(EmitMessage::Data(data)) => data,
            Some(EmitMessage::Stop) | None => {
                debug!(worker_id, "Emit worker hit stop signal");
                return Ok(());
            }
        };

        let emit_key = data.emit_key.emit_key.clone();
        match shared.emitter.emit(data).await {
            Ok(()) => {
                trace!(worker_id, emit_key = %emit_key, "Emitted");
                metrics::EMITS_TOTAL.with_label_values(&["success"]).inc();
            }
            Err(e) if e.is_unrecoverable() => {
                error!(worker_id, emit_key = %emit_key, error = %e, "Emitter is unavailable");
                metrics::EMITS_TOTAL.with_label_values(&["fatal"]).inc();
                return Err(e.into());
            }
            Err(e) => {
                warn!(worker_id, emit_key = %emit_key, error = %e, "Emit failed");
                metrics::EMITS_TOTAL.with_label_values(&["failed"]).inc();
            }
        }
    }
}
