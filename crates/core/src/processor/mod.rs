//! Processor module for the fetch/emit pipeline.
//!
//! This module provides the `AsyncProcessor` which coordinates two pools:
//! - Fetch workers: each owns a processing client, pulls tuples from the
//!   intake queue and hands successful results to the outtake queue
//! - Emit workers: pull results from the outtake queue and write them out
//!   through the emitter
//!
//! Both queues are bounded. Shutdown is a handshake: `finished()` sends one
//! stop signal per fetch worker, and once every fetch worker is gone
//! `check_active()` sends one stop signal per emit worker.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use docpipe_core::processor::{AsyncProcessor, ProcessorConfig};
//! use docpipe_core::pipes::LoggingReporter;
//!
//! let processor = AsyncProcessor::new(
//!     ProcessorConfig::default(),
//!     client_factory,
//!     emitter,
//!     Arc::new(LoggingReporter),
//! )?;
//! processor.start().await;
//!
//! for tuple in tuples {
//!     processor.offer(tuple, Duration::from_secs(10)).await?;
//! }
//! processor.finished().await?;
//!
//! while processor.check_active().await? {
//!     tokio::time::sleep(Duration::from_millis(100)).await;
//! }
//! println!("Processed {}", processor.total_processed());
//! ```

mod config;
mod emit_worker;
mod fetch_worker;
mod pipeline;
mod types;

pub use config::ProcessorConfig;
pub use fetch_worker::FETCH_POLL_TIMEOUT;
pub use pipeline::{AsyncProcessor, PipelineError, EMIT_QUEUE_SIZE, OFFER_POLL_INTERVAL};
pub use types::{PipelinePhase, PipelineStatus, PoolStatus, WorkerRole};
