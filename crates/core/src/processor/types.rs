//! Types for the processor module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipes::{EmitData, FetchEmitTuple};

/// Message on the intake queue.
#[derive(Debug)]
pub(crate) enum FetchMessage {
    Tuple(FetchEmitTuple),
    /// Tells exactly one fetch worker to exit.
    Stop,
}

/// Message on the outtake queue.
#[derive(Debug)]
pub(crate) enum EmitMessage {
    Data(EmitData),
    /// Tells exactly one emit worker to exit.
    Stop,
}

/// Which pool a worker belongs to; returned by a worker when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Fetch,
    Emit,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Emit => "emit",
        }
    }
}

/// Lifecycle phase of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// Built, workers not launched yet.
    NotStarted,
    /// Both pools active, accepting work.
    Running,
    /// No more work accepted; workers finishing the backlog.
    Draining,
    /// Every worker has exited.
    Stopped,
    /// Workers were aborted.
    Closed,
}

/// Status of one worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Pool name ("fetch" or "emit").
    pub name: String,
    /// Number of workers in the pool.
    pub size: usize,
    /// Workers that have exited cleanly.
    pub finished: usize,
}

/// Point-in-time view of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub phase: PipelinePhase,
    /// When the workers were launched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Intake queue capacity.
    pub queue_size: usize,
    /// Free intake slots.
    pub remaining_capacity: usize,
    /// Free outtake slots.
    pub emit_queue_remaining: usize,
    pub fetch_pool: PoolStatus,
    pub emit_pool: PoolStatus,
    /// Tuples attempted so far, successful or not.
    pub total_processed: u64,
}
