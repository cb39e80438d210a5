//! Trait definitions for the pipeline's external collaborators.

use async_trait::async_trait;
use std::time::Duration;

use super::error::{ClientError, EmitError};
use super::types::{EmitData, FetchEmitTuple, PipesResult};

/// Fetches and processes tuples, one at a time.
///
/// Each fetch worker owns exactly one client for its whole lifetime, so
/// implementations do not need to be shareable. Whatever the client holds
/// (a child process, a connection) is released when it is dropped.
#[async_trait]
pub trait ProcessingClient: Send {
    /// Fetches and processes one tuple.
    ///
    /// [`ClientError::Io`] is treated as a crash of this tuple only; any
    /// other error stops the owning worker.
    async fn process(&mut self, tuple: &FetchEmitTuple) -> Result<PipesResult, ClientError>;
}

/// Creates one processing client per fetch worker.
#[async_trait]
pub trait ProcessingClientFactory: Send + Sync {
    /// Returns the name of this client implementation.
    fn name(&self) -> &str;

    /// Creates a new, private client.
    async fn create(&self) -> Result<Box<dyn ProcessingClient>, ClientError>;
}

/// Persists or delivers extracted results.
///
/// Idempotency and retries are the emitter's business.
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Returns the name of this emitter implementation.
    fn name(&self) -> &str;

    /// Emits one payload.
    async fn emit(&self, data: EmitData) -> Result<(), EmitError>;
}

/// Receives the outcome of every processed tuple.
///
/// Called inline by the fetch workers; must not block and must not fail.
pub trait PipesReporter: Send + Sync {
    fn report(&self, tuple: &FetchEmitTuple, result: &PipesResult, elapsed: Duration);
}
