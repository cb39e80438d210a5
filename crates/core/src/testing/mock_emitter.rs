//! Mock emitter for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::pipes::{EmitData, EmitError, Emitter};

/// Mock implementation of the Emitter trait.
///
/// Provides controllable behavior for testing:
/// - Record every payload delivered
/// - Fail the next emit with a given error
/// - Simulate slow emits
#[derive(Debug, Clone)]
pub struct MockEmitter {
    /// Payloads delivered successfully.
    emitted: Arc<RwLock<Vec<EmitData>>>,
    /// Number of emit attempts, successful or not.
    attempts: Arc<RwLock<usize>>,
    /// If set, the next emit will fail with this error.
    next_error: Arc<RwLock<Option<EmitError>>>,
    /// Simulated emit duration in milliseconds.
    emit_duration_ms: Arc<RwLock<u64>>,
}

impl Default for MockEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmitter {
    /// Create a new mock emitter.
    pub fn new() -> Self {
        Self {
            emitted: Arc::new(RwLock::new(Vec::new())),
            attempts: Arc::new(RwLock::new(0)),
            next_error: Arc::new(RwLock::new(None)),
            emit_duration_ms: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all delivered payloads.
    pub async fn emitted(&self) -> Vec<EmitData> {
        self.emitted.read().await.clone()
    }

    /// Emit keys of all delivered payloads.
    pub async fn emitted_keys(&self) -> Vec<String> {
        self.emitted
            .read()
            .await
            .iter()
            .map(|d| d.emit_key.emit_key.clone())
            .collect()
    }

    /// Get the number of delivered payloads.
    pub async fn emit_count(&self) -> usize {
        self.emitted.read().await.len()
    }

    /// Get the number of emit attempts.
    pub async fn attempt_count(&self) -> usize {
        *self.attempts.read().await
    }

    /// Configure the next emit to fail with the given error.
    pub async fn set_next_error(&self, error: EmitError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated emit duration.
    pub async fn set_emit_duration(&self, duration: Duration) {
        *self.emit_duration_ms.write().await = duration.as_millis() as u64;
    }
}

#[async_trait]
impl Emitter for MockEmitter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn emit(&self, data: EmitData) -> Result<(), EmitError> {
        *self.attempts.write().await += 1;

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let duration_ms = *self.emit_duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        self.emitted.write().await.push(data);
        Ok(())
    }
}
