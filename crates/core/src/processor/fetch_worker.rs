//! Fetch/process worker loop.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::metrics;
use crate::pipes::{FetchEmitTuple, PipesResult, ProcessingClient};

use super::pipeline::{send_with_ceiling, PipelineError, Shared, WorkerExit};
use super::types::{EmitMessage, FetchMessage, WorkerRole};

/// How long a fetch worker waits on an empty intake queue before looping.
pub const FETCH_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs one fetch worker to completion.
pub(super) async fn run(worker_id: usize, shared: Arc<Shared>) -> WorkerExit {
    let result = fetch_loop(worker_id, &shared).await;
    WorkerExit {
        role: WorkerRole::Fetch,
        worker_id,
        result,
    }
}

async fn fetch_loop(worker_id: usize, shared: &Shared) -> Result<(), PipelineError> {
    // Owned for the whole loop; dropped on every exit path, including abort.
    let mut client = shared.client_factory.create().await?;
    debug!(
        worker_id,
        client = shared.client_factory.name(),
        "Fetch worker started"
    );

    loop {
        let message = {
            let mut rx = shared.fetch_rx.lock().await;
            tokio::time::timeout(FETCH_POLL_TIMEOUT, rx.recv()).await
        };

        match message {
            Err(_) => trace!(worker_id, "No tuple within poll timeout"),
            Ok(Some(FetchMessage::Stop)) | Ok(None) => {
                debug!(worker_id, "Fetch worker hit stop signal");
                return Ok(());
            }
            Ok(Some(FetchMessage::Tuple(tuple))) => {
                process_one(worker_id, shared, client.as_mut(), tuple).await?;
            }
        }

        shared.try_poll_completion().await?;
    }
}

async fn process_one(
    worker_id: usize,
    shared: &Shared,
    client: &mut dyn ProcessingClient,
    tuple: FetchEmitTuple,
) -> Result<(), PipelineError> {
    let start = Instant::now();
    let result = match client.process(&tuple).await {
        Ok(result) => result,
        Err(e) if e.is_per_item() => {
            warn!(
                worker_id,
                id = tuple.id(),
                error = %e,
                "Processing client crashed"
            );
            PipesResult::UnspecifiedCrash
        }
        Err(e) => return Err(e.into()),
    };
    trace!(
        worker_id,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "timer -- process"
    );

    let status = result.status();
    if let Some(data) = result.emittable() {
        let offer_start = Instant::now();
        send_with_ceiling(
            &shared.emit_tx,
            EmitMessage::Data(data.clone()),
            "emit data",
            shared.config.max_offer_wait(),
        )
        .await?;
        trace!(
            worker_id,
            elapsed_ms = offer_start.elapsed().as_millis() as u64,
            "timer -- offered"
        );
    }

    let elapsed = start.elapsed();
    shared.reporter.report(&tuple, &result, elapsed);
    metrics::TUPLES_PROCESSED
        .with_label_values(&[status.as_str()])
        .inc();
    metrics::PROCESSING_DURATION
        .with_label_values(&[status.as_str()])
        .observe(elapsed.as_secs_f64());
    shared.total_processed.fetch_add(1, Ordering::Relaxed);

    Ok(())
}
