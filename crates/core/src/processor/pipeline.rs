//! Async fetch/emit pipeline implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, Mutex};
use tokio::task::{AbortHandle, Id as TaskId, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;
use crate::metrics;
use crate::pipes::{
    ClientError, EmitError, Emitter, FetchEmitTuple, PipesReporter, ProcessingClientFactory,
};

use super::config::ProcessorConfig;
use super::types::{
    EmitMessage, FetchMessage, PipelinePhase, PipelineStatus, PoolStatus, WorkerRole,
};
use super::{emit_worker, fetch_worker};

/// Capacity of the outtake queue between the two pools.
pub const EMIT_QUEUE_SIZE: usize = 100;

/// How often a batch offer re-checks the intake queue for room.
pub const OFFER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Workers have not been launched.
    #[error("Pipeline has not been started")]
    NotInitialized,

    /// Submitting after `finished()` or `close()`.
    #[error("Pipeline is shutting down; no more work is accepted")]
    ShuttingDown,

    /// A batch can never be larger than the whole intake queue.
    #[error("Batch of {batch_size} tuples is larger than the queue size ({queue_size})")]
    BatchTooLarge { batch_size: usize, queue_size: usize },

    /// A bounded hand-off did not complete; the consumer is presumed stuck.
    #[error("Couldn't offer {what} within {waited_ms} ms")]
    Stalled { what: &'static str, waited_ms: u64 },

    /// A worker exited with an error or panicked.
    #[error("{role} worker failed: {reason}")]
    WorkerFailed { role: &'static str, reason: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Processing client error that a worker could not contain.
    #[error("Processing client error: {0}")]
    Client(#[from] ClientError),

    /// Unrecoverable emitter error.
    #[error("Emitter error: {0}")]
    Emit(#[from] EmitError),
}

/// What a worker task returns when it exits.
pub(super) struct WorkerExit {
    pub role: WorkerRole,
    pub worker_id: usize,
    pub result: Result<(), PipelineError>,
}

/// A failure latched by the poll that first saw it.
#[derive(Debug, Clone)]
enum Failure {
    Worker { role: &'static str, reason: String },
    Stalled { what: &'static str, waited_ms: u64 },
}

impl Failure {
    fn from_error(role: &'static str, e: &PipelineError) -> Self {
        match e {
            PipelineError::Stalled { what, waited_ms } => Self::Stalled {
                what: *what,
                waited_ms: *waited_ms,
            },
            other => Self::Worker {
                role,
                reason: other.to_string(),
            },
        }
    }

    fn to_error(&self) -> PipelineError {
        match self {
            Self::Worker { role, reason } => PipelineError::WorkerFailed {
                role: *role,
                reason: reason.clone(),
            },
            Self::Stalled { what, waited_ms } => PipelineError::Stalled {
                what: *what,
                waited_ms: *waited_ms,
            },
        }
    }
}

/// Completion tracking, guarded by a single lock.
struct PipelineState {
    workers: JoinSet<WorkerExit>,
    /// Pool of each spawned task, for tasks that panic.
    roles: HashMap<TaskId, WorkerRole>,
    started_at: Option<DateTime<Utc>>,
    fetch_finished: usize,
    emit_finished: usize,
    /// Every exited worker, including aborted and failed ones.
    finished: usize,
    emit_stop_sent: bool,
    /// First failure; reported by every later poll.
    failure: Option<Failure>,
}

/// State shared by the processor handle and every worker.
pub(super) struct Shared {
    pub config: ProcessorConfig,
    pub fetch_tx: mpsc::Sender<FetchMessage>,
    pub fetch_rx: Mutex<mpsc::Receiver<FetchMessage>>,
    pub emit_tx: mpsc::Sender<EmitMessage>,
    pub emit_rx: Mutex<mpsc::Receiver<EmitMessage>>,
    pub client_factory: Arc<dyn ProcessingClientFactory>,
    pub emitter: Arc<dyn Emitter>,
    pub reporter: Arc<dyn PipesReporter>,
    pub total_processed: AtomicU64,
    started: AtomicBool,
    shutting_down: AtomicBool,
    fetch_stop_sent: AtomicBool,
    closed: AtomicBool,
    /// Serializes producer submissions.
    producer: Mutex<()>,
    state: Mutex<PipelineState>,
    abort_handles: StdMutex<Vec<AbortHandle>>,
}

/// Sends on a bounded queue, failing with [`PipelineError::Stalled`] after `wait`.
pub(super) async fn send_with_ceiling<T>(
    tx: &mpsc::Sender<T>,
    message: T,
    what: &'static str,
    wait: Duration,
) -> Result<(), PipelineError> {
    match tx.send_timeout(message, wait).await {
        Ok(()) => Ok(()),
        Err(SendTimeoutError::Timeout(_)) | Err(SendTimeoutError::Closed(_)) => {
            error!(what, waited_ms = wait.as_millis() as u64, "Queue hand-off stalled");
            Err(PipelineError::Stalled {
                what,
                waited_ms: wait.as_millis() as u64,
            })
        }
    }
}

impl Shared {
    fn ensure_accepting(&self) -> Result<(), PipelineError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(PipelineError::NotInitialized);
        }
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(PipelineError::ShuttingDown);
        }
        Ok(())
    }

    /// Aborts every worker. Safe to call from sync code and from a worker.
    fn abort_workers(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        let handles = self
            .abort_handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for handle in handles.iter() {
            handle.abort();
        }
    }

    /// Tears the pipeline down and latches the failure.
    fn fail(&self, state: &mut PipelineState, failure: Failure) -> PipelineError {
        self.abort_workers();
        let err = failure.to_error();
        state.failure = Some(failure);
        err
    }

    /// Completion poll used by the workers between tuples.
    ///
    /// Skipped when another poll or a submission holds the state.
    pub(super) async fn try_poll_completion(&self) -> Result<(), PipelineError> {
        if let Ok(mut state) = self.state.try_lock() {
            self.poll_completion(&mut state).await?;
        }
        Ok(())
    }

    /// Collects exited workers and, once every fetch worker is done,
    /// injects one emit stop signal per emit worker (exactly once).
    ///
    /// Returns true while any worker is still running.
    async fn poll_completion(&self, state: &mut PipelineState) -> Result<bool, PipelineError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(PipelineError::NotInitialized);
        }
        if let Some(failure) = &state.failure {
            return Err(failure.to_error());
        }

        while let Some(joined) = state.workers.try_join_next() {
            state.finished += 1;
            match joined {
                Ok(WorkerExit {
                    role,
                    worker_id,
                    result: Ok(()),
                }) => {
                    debug!(role = role.as_str(), worker_id, "Worker finished");
                    match role {
                        WorkerRole::Fetch => state.fetch_finished += 1,
                        WorkerRole::Emit => state.emit_finished += 1,
                    }
                }
                Ok(WorkerExit {
                    role,
                    worker_id,
                    result: Err(e),
                }) => {
                    error!(role = role.as_str(), worker_id, error = %e, "Worker failed");
                    let failure = Failure::Worker {
                        role: role.as_str(),
                        reason: e.to_string(),
                    };
                    return Err(self.fail(state, failure));
                }
                Err(e) if e.is_cancelled() => {
                    debug!("Worker aborted");
                }
                Err(e) => {
                    let role = state
                        .roles
                        .get(&e.id())
                        .map(|role| role.as_str())
                        .unwrap_or("unknown");
                    error!(role, error = %e, "Worker panicked");
                    let failure = Failure::Worker {
                        role,
                        reason: e.to_string(),
                    };
                    return Err(self.fail(state, failure));
                }
            }
        }

        if state.fetch_finished == self.config.num_clients && !state.emit_stop_sent {
            info!(
                emitters = self.config.num_emitters,
                "All fetch workers finished; stopping emit workers"
            );
            for _ in 0..self.config.num_emitters {
                if let Err(e) = send_with_ceiling(
                    &self.emit_tx,
                    EmitMessage::Stop,
                    "emit stop signal",
                    self.config.max_offer_wait(),
                )
                .await
                {
                    state.emit_stop_sent = true;
                    return Err(self.fail(state, Failure::from_error("emit", &e)));
                }
                metrics::STOP_SIGNALS.with_label_values(&["emit"]).inc();
            }
            state.emit_stop_sent = true;
        }

        Ok(state.finished != self.config.total_workers())
    }
}

/// Bounded two-stage pipeline: fetch/process workers feed emit workers.
///
/// Producers push [`FetchEmitTuple`]s with [`offer`](Self::offer) or
/// [`offer_batch`](Self::offer_batch), call [`finished`](Self::finished)
/// when they have nothing more, then call
/// [`check_active`](Self::check_active) until it returns `false`.
///
/// Dropping the processor aborts any worker still running.
pub struct AsyncProcessor {
    shared: Arc<Shared>,
}

impl AsyncProcessor {
    /// Creates a processor and allocates both queues. No worker runs until
    /// [`start`](Self::start).
    pub fn new(
        config: ProcessorConfig,
        client_factory: Arc<dyn ProcessingClientFactory>,
        emitter: Arc<dyn Emitter>,
        reporter: Arc<dyn PipesReporter>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let (fetch_tx, fetch_rx) = mpsc::channel(config.queue_size);
        let (emit_tx, emit_rx) = mpsc::channel(EMIT_QUEUE_SIZE);

        let shared = Shared {
            config,
            fetch_tx,
            fetch_rx: Mutex::new(fetch_rx),
            emit_tx,
            emit_rx: Mutex::new(emit_rx),
            client_factory,
            emitter,
            reporter,
            total_processed: AtomicU64::new(0),
            started: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            fetch_stop_sent: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            producer: Mutex::new(()),
            state: Mutex::new(PipelineState {
                workers: JoinSet::new(),
                roles: HashMap::new(),
                started_at: None,
                fetch_finished: 0,
                emit_finished: 0,
                finished: 0,
                emit_stop_sent: false,
                failure: None,
            }),
            abort_handles: StdMutex::new(Vec::new()),
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Launches both worker pools on the current runtime.
    pub async fn start(&self) {
        let mut state = self.shared.state.lock().await;
        if self.shared.started.load(Ordering::SeqCst) {
            warn!("Pipeline already started");
            return;
        }

        let config = &self.shared.config;
        info!(
            queue_size = config.queue_size,
            num_clients = config.num_clients,
            num_emitters = config.num_emitters,
            client = self.shared.client_factory.name(),
            emitter = self.shared.emitter.name(),
            "Starting async pipeline"
        );

        let mut handles = Vec::with_capacity(config.total_workers());
        for worker_id in 0..config.num_clients {
            let handle = state
                .workers
                .spawn(fetch_worker::run(worker_id, Arc::clone(&self.shared)));
            state.roles.insert(handle.id(), WorkerRole::Fetch);
            handles.push(handle);
        }
        for worker_id in 0..config.num_emitters {
            let handle = state
                .workers
                .spawn(emit_worker::run(worker_id, Arc::clone(&self.shared)));
            state.roles.insert(handle.id(), WorkerRole::Emit);
            handles.push(handle);
        }

        *self
            .shared
            .abort_handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = handles;
        state.started_at = Some(Utc::now());
        self.shared.started.store(true, Ordering::SeqCst);
    }

    /// Offers one tuple, waiting up to `timeout` for room.
    ///
    /// Returns `Ok(false)` if the queue stayed full.
    pub async fn offer(
        &self,
        tuple: FetchEmitTuple,
        timeout: Duration,
    ) -> Result<bool, PipelineError> {
        let _producer = self.shared.producer.lock().await;
        self.shared.ensure_accepting()?;
        {
            let mut state = self.shared.state.lock().await;
            self.shared.poll_completion(&mut state).await?;
        }

        match self
            .shared
            .fetch_tx
            .send_timeout(FetchMessage::Tuple(tuple), timeout)
            .await
        {
            Ok(()) => Ok(true),
            Err(SendTimeoutError::Timeout(_)) => Ok(false),
            Err(SendTimeoutError::Closed(_)) => Err(PipelineError::ShuttingDown),
        }
    }

    /// Offers a batch of tuples all-or-nothing, waiting up to `timeout`.
    ///
    /// Fails with [`PipelineError::BatchTooLarge`] when the batch could
    /// never fit. Otherwise re-checks every [`OFFER_POLL_INTERVAL`] and
    /// admits the whole batch once the queue has room for it. Returns
    /// `Ok(false)` if that did not happen in time; nothing is enqueued then.
    pub async fn offer_batch(
        &self,
        tuples: Vec<FetchEmitTuple>,
        timeout: Duration,
    ) -> Result<bool, PipelineError> {
        self.shared.ensure_accepting()?;
        let queue_size = self.shared.config.queue_size;
        if tuples.len() > queue_size {
            return Err(PipelineError::BatchTooLarge {
                batch_size: tuples.len(),
                queue_size,
            });
        }
        if tuples.is_empty() {
            return Ok(true);
        }

        let _producer = self.shared.producer.lock().await;
        self.shared.ensure_accepting()?;

        // A timeout too large to add to now never expires.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.shared.fetch_tx.capacity() >= tuples.len() {
                match self.shared.fetch_tx.try_reserve_many(tuples.len()) {
                    Ok(permits) => {
                        debug!(count = tuples.len(), "Batch admitted");
                        for (permit, tuple) in permits.zip(tuples) {
                            permit.send(FetchMessage::Tuple(tuple));
                        }
                        return Ok(true);
                    }
                    Err(TrySendError::Full(())) => {}
                    Err(TrySendError::Closed(())) => return Err(PipelineError::ShuttingDown),
                }
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(count = tuples.len(), "Batch offer timed out");
                        return Ok(false);
                    }
                    OFFER_POLL_INTERVAL.min(deadline - now)
                }
                None => OFFER_POLL_INTERVAL,
            };
            tokio::time::sleep(pause).await;
        }
    }

    /// Free intake slots right now. Advisory only: other producers race.
    pub fn remaining_capacity(&self) -> usize {
        self.shared.fetch_tx.capacity()
    }

    /// Signals that no more work is coming: one stop signal per fetch worker.
    ///
    /// Further submissions fail with [`PipelineError::ShuttingDown`].
    pub async fn finished(&self) -> Result<(), PipelineError> {
        if !self.shared.started.load(Ordering::SeqCst) {
            return Err(PipelineError::NotInitialized);
        }
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(PipelineError::ShuttingDown);
        }
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        if self.shared.fetch_stop_sent.swap(true, Ordering::SeqCst) {
            warn!("finished() called more than once");
            return Ok(());
        }

        let _producer = self.shared.producer.lock().await;
        info!(
            fetch_workers = self.shared.config.num_clients,
            "No more work; stopping fetch workers"
        );
        for _ in 0..self.shared.config.num_clients {
            if let Err(e) = send_with_ceiling(
                &self.shared.fetch_tx,
                FetchMessage::Stop,
                "fetch stop signal",
                self.shared.config.max_offer_wait(),
            )
            .await
            {
                let mut state = self.shared.state.lock().await;
                return Err(self.shared.fail(&mut state, Failure::from_error("fetch", &e)));
            }
            metrics::STOP_SIGNALS.with_label_values(&["fetch"]).inc();
        }
        Ok(())
    }

    /// Non-blocking progress check; drives the emit shutdown phase.
    ///
    /// Returns `Ok(true)` while any worker is running and `Ok(false)` once
    /// all of them have exited. A failed worker tears the pipeline down and
    /// is reported as [`PipelineError::WorkerFailed`].
    pub async fn check_active(&self) -> Result<bool, PipelineError> {
        let mut state = self.shared.state.lock().await;
        self.shared.poll_completion(&mut state).await
    }

    /// Aborts every worker immediately. In-flight tuples are lost.
    pub fn close(&self) {
        if self.shared.closed.load(Ordering::SeqCst) {
            return;
        }
        info!("Closing async pipeline");
        self.shared.abort_workers();
    }

    /// Tuples attempted so far, whatever their outcome.
    pub fn total_processed(&self) -> u64 {
        self.shared.total_processed.load(Ordering::Relaxed)
    }

    /// Returns the current pipeline status.
    pub async fn status(&self) -> PipelineStatus {
        let state = self.shared.state.lock().await;
        let config = &self.shared.config;

        let phase = if !self.shared.started.load(Ordering::SeqCst) {
            PipelinePhase::NotStarted
        } else if self.shared.closed.load(Ordering::SeqCst) {
            PipelinePhase::Closed
        } else if state.finished == config.total_workers() {
            PipelinePhase::Stopped
        } else if self.shared.shutting_down.load(Ordering::SeqCst) {
            PipelinePhase::Draining
        } else {
            PipelinePhase::Running
        };

        PipelineStatus {
            phase,
            started_at: state.started_at,
            queue_size: config.queue_size,
            remaining_capacity: self.shared.fetch_tx.capacity(),
            emit_queue_remaining: self.shared.emit_tx.capacity(),
            fetch_pool: PoolStatus {
                name: WorkerRole::Fetch.as_str().to_string(),
                size: config.num_clients,
                finished: state.fetch_finished,
            },
            emit_pool: PoolStatus {
                name: WorkerRole::Emit.as_str().to_string(),
                size: config.num_emitters,
                finished: state.emit_finished,
            },
            total_processed: self.total_processed(),
        }
    }
}

impl Drop for AsyncProcessor {
    fn drop(&mut self) {
        self.shared.abort_workers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::{EmitKey, FetchKey, NoOpReporter};
    use crate::testing::{MockEmitter, MockProcessingClientFactory};

    fn processor(config: ProcessorConfig) -> AsyncProcessor {
        AsyncProcessor::new(
            config,
            Arc::new(MockProcessingClientFactory::new()),
            Arc::new(MockEmitter::new()),
            Arc::new(NoOpReporter),
        )
        .unwrap()
    }

    fn tuple(key: &str) -> FetchEmitTuple {
        FetchEmitTuple::with_id(key, FetchKey::new("fs", key), EmitKey::new("fs", key))
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = AsyncProcessor::new(
            ProcessorConfig::default().with_queue_size(0),
            Arc::new(MockProcessingClientFactory::new()),
            Arc::new(MockEmitter::new()),
            Arc::new(NoOpReporter),
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_not_started() {
        let processor = processor(ProcessorConfig::default().with_queue_size(5));

        let result = processor.offer(tuple("a"), Duration::from_millis(10)).await;
        assert!(matches!(result, Err(PipelineError::NotInitialized)));

        let result = processor
            .offer_batch(vec![tuple("a")], Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(PipelineError::NotInitialized)));

        assert!(matches!(
            processor.check_active().await,
            Err(PipelineError::NotInitialized)
        ));
        assert!(matches!(
            processor.finished().await,
            Err(PipelineError::NotInitialized)
        ));
        assert_eq!(processor.status().await.phase, PipelinePhase::NotStarted);
        assert_eq!(processor.remaining_capacity(), 5);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let processor = processor(
            ProcessorConfig::default()
                .with_num_clients(2)
                .with_num_emitters(1),
        );
        processor.start().await;
        processor.start().await;

        let status = processor.status().await;
        assert_eq!(status.phase, PipelinePhase::Running);
        assert!(status.started_at.is_some());
        assert_eq!(processor.shared.abort_handles.lock().unwrap().len(), 3);
        assert_eq!(processor.shared.state.lock().await.roles.len(), 3);
        processor.close();
    }

    #[tokio::test]
    async fn test_batch_too_large() {
        let processor = processor(ProcessorConfig::default().with_queue_size(5));
        processor.start().await;

        let batch = (0..6).map(|i| tuple(&format!("doc-{}", i))).collect();
        let result = processor.offer_batch(batch, Duration::from_secs(5)).await;

        assert!(matches!(
            result,
            Err(PipelineError::BatchTooLarge {
                batch_size: 6,
                queue_size: 5
            })
        ));
        assert_eq!(processor.remaining_capacity(), 5);
        processor.close();
    }

    #[tokio::test]
    async fn test_offer_after_finished_is_rejected() {
        let processor = processor(ProcessorConfig::default().with_queue_size(5));
        processor.start().await;
        processor.finished().await.unwrap();

        let result = processor.offer(tuple("late"), Duration::from_millis(10)).await;
        assert!(matches!(result, Err(PipelineError::ShuttingDown)));
        assert_eq!(processor.status().await.phase, PipelinePhase::Draining);
    }

    #[tokio::test]
    async fn test_close_rejects_everything() {
        let processor = processor(ProcessorConfig::default());
        processor.start().await;
        processor.close();

        assert!(matches!(
            processor.offer(tuple("a"), Duration::from_millis(10)).await,
            Err(PipelineError::ShuttingDown)
        ));
        assert!(matches!(
            processor.finished().await,
            Err(PipelineError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_unbounded_timeouts_are_accepted() {
        let processor = processor(ProcessorConfig::default().with_queue_size(5));
        processor.start().await;

        assert!(processor.offer(tuple("a"), Duration::MAX).await.unwrap());
        let accepted = processor
            .offer_batch(vec![tuple("b"), tuple("c")], Duration::MAX)
            .await
            .unwrap();
        assert!(accepted);
        processor.close();
    }

    #[test]
    fn test_stall_failure_replays_as_stall() {
        let stalled = PipelineError::Stalled {
            what: "emit stop signal",
            waited_ms: 3000,
        };
        let failure = Failure::from_error("emit", &stalled);
        assert!(matches!(
            failure.to_error(),
            PipelineError::Stalled {
                what: "emit stop signal",
                waited_ms: 3000
            }
        ));

        let failure = Failure::from_error("fetch", &PipelineError::ShuttingDown);
        assert!(matches!(
            failure.to_error(),
            PipelineError::WorkerFailed { role: "fetch", .. }
        ));
    }

    #[tokio::test]
    async fn test_send_with_ceiling_stalls_on_full_queue() {
        let (tx, _rx) = mpsc::channel::<u32>(1);
        send_with_ceiling(&tx, 1, "first", Duration::from_millis(10))
            .await
            .unwrap();

        let result = send_with_ceiling(&tx, 2, "second", Duration::from_millis(10)).await;
        assert!(matches!(
            result,
            Err(PipelineError::Stalled {
                what: "second",
                waited_ms: 10
            })
        ));
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::BatchTooLarge {
            batch_size: 6,
            queue_size: 5,
        };
        assert_eq!(
            err.to_string(),
            "Batch of 6 tuples is larger than the queue size (5)"
        );

        let err = PipelineError::Stalled {
            what: "emit stop signal",
            waited_ms: 120_000,
        };
        assert_eq!(
            err.to_string(),
            "Couldn't offer emit stop signal within 120000 ms"
        );
    }
}
