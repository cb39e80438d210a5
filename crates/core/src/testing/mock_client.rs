//! Mock processing client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::pipes::{
    ClientError, EmitData, FetchEmitTuple, Metadata, PipesResult, ProcessingClient,
    ProcessingClientFactory,
};

/// What a mock client does with a given fetch key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// Parse succeeds; the payload carries the tuple's metadata.
    Success,
    /// Parse succeeds with a non-fatal exception message.
    SuccessWithException(String),
    /// Parser fails.
    ParseException(String),
    /// Fetch fails.
    FetchException(String),
    /// Client reports a timeout.
    Timeout,
    /// Client transport breaks (`ClientError::Io`).
    IoError,
    /// Client becomes unusable (`ClientError::Fatal`).
    Fatal(String),
    /// Client panics mid-tuple.
    Panic(String),
}

/// Mock implementation of the ProcessingClientFactory trait.
///
/// Every client it creates shares the factory's state, so outcomes and
/// recordings apply across the whole fetch pool:
/// - Per-fetch-key outcomes (default: success)
/// - Simulated processing duration
/// - Processed keys in processing order
/// - Created/released client counts
/// - Startup failure
///
/// # Example
///
/// ```rust,ignore
/// use docpipe_core::testing::{MockOutcome, MockProcessingClientFactory};
///
/// let factory = MockProcessingClientFactory::new();
/// factory.set_outcome("doc-2", MockOutcome::IoError).await;
///
/// // Run the pipeline...
///
/// assert_eq!(factory.processed_keys().await.len(), 3);
/// assert_eq!(factory.created_count(), factory.released_count());
/// ```
#[derive(Debug, Clone)]
pub struct MockProcessingClientFactory {
    /// Outcome per fetch key.
    outcomes: Arc<RwLock<HashMap<String, MockOutcome>>>,
    /// Fetch keys in the order they were processed.
    processed: Arc<RwLock<Vec<String>>>,
    /// Simulated processing duration in milliseconds.
    process_duration_ms: Arc<RwLock<u64>>,
    /// If set, `create` fails with this reason.
    startup_error: Arc<RwLock<Option<String>>>,
    created: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl Default for MockProcessingClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessingClientFactory {
    /// Create a new mock factory.
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(RwLock::new(HashMap::new())),
            processed: Arc::new(RwLock::new(Vec::new())),
            process_duration_ms: Arc::new(RwLock::new(0)),
            startup_error: Arc::new(RwLock::new(None)),
            created: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the outcome for a fetch key.
    pub async fn set_outcome(&self, fetch_key: &str, outcome: MockOutcome) {
        self.outcomes
            .write()
            .await
            .insert(fetch_key.to_string(), outcome);
    }

    /// Set the simulated processing duration.
    pub async fn set_process_duration(&self, duration: Duration) {
        *self.process_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Make every subsequent `create` fail.
    pub async fn set_startup_error(&self, reason: &str) {
        *self.startup_error.write().await = Some(reason.to_string());
    }

    /// Fetch keys in processing order.
    pub async fn processed_keys(&self) -> Vec<String> {
        self.processed.read().await.clone()
    }

    /// Number of clients created.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of clients dropped.
    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessingClientFactory for MockProcessingClientFactory {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create(&self) -> Result<Box<dyn ProcessingClient>, ClientError> {
        if let Some(reason) = self.startup_error.read().await.clone() {
            return Err(ClientError::startup(reason));
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockProcessingClient {
            factory: self.clone(),
        }))
    }
}

/// Client handed out by [`MockProcessingClientFactory`].
#[derive(Debug)]
pub struct MockProcessingClient {
    factory: MockProcessingClientFactory,
}

#[async_trait]
impl ProcessingClient for MockProcessingClient {
    async fn process(&mut self, tuple: &FetchEmitTuple) -> Result<PipesResult, ClientError> {
        let key = tuple.fetch_key().fetch_key.clone();
        self.factory.processed.write().await.push(key.clone());

        let duration_ms = *self.factory.process_duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        let outcome = self
            .factory
            .outcomes
            .read()
            .await
            .get(&key)
            .cloned()
            .unwrap_or(MockOutcome::Success);

        match outcome {
            MockOutcome::Success => Ok(PipesResult::ParseSuccess(payload(tuple))),
            MockOutcome::SuccessWithException(message) => {
                Ok(PipesResult::ParseSuccessWithException {
                    data: payload(tuple),
                    message,
                })
            }
            MockOutcome::ParseException(cause) => Ok(PipesResult::ParseException { cause }),
            MockOutcome::FetchException(cause) => Ok(PipesResult::FetchException { cause }),
            MockOutcome::Timeout => Ok(PipesResult::Timeout),
            MockOutcome::IoError => Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock client connection lost",
            ))),
            MockOutcome::Fatal(reason) => Err(ClientError::fatal(reason)),
            MockOutcome::Panic(message) => panic!("{}", message),
        }
    }
}

impl Drop for MockProcessingClient {
    fn drop(&mut self) {
        self.factory.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn payload(tuple: &FetchEmitTuple) -> EmitData {
    let mut metadata = tuple.metadata().clone();
    metadata.set("resourceName", tuple.fetch_key().fetch_key.clone());
    let mut content = Metadata::new();
    content.set("content", format!("parsed {}", tuple.fetch_key().fetch_key));
    EmitData::new(tuple.emit_key().clone(), vec![metadata, content])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::{EmitKey, FetchKey};

    fn tuple(key: &str) -> FetchEmitTuple {
        FetchEmitTuple::new(FetchKey::new("fs", key), EmitKey::new("fs", key))
    }

    #[tokio::test]
    async fn test_default_outcome_is_success() {
        let factory = MockProcessingClientFactory::new();
        let mut client = factory.create().await.unwrap();

        let result = client.process(&tuple("a")).await.unwrap();
        let data = result.emit_data().unwrap();
        assert_eq!(data.metadata_list[0].get("resourceName"), Some("a"));
        assert_eq!(factory.processed_keys().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_configured_outcomes() {
        let factory = MockProcessingClientFactory::new();
        factory.set_outcome("bad", MockOutcome::IoError).await;
        factory
            .set_outcome("broken", MockOutcome::ParseException("bad pdf".into()))
            .await;
        let mut client = factory.create().await.unwrap();

        assert!(matches!(
            client.process(&tuple("bad")).await,
            Err(ClientError::Io(_))
        ));
        let result = client.process(&tuple("broken")).await.unwrap();
        assert_eq!(result.message(), Some("bad pdf"));
    }

    #[tokio::test]
    async fn test_release_counting() {
        let factory = MockProcessingClientFactory::new();
        let client = factory.create().await.unwrap();
        assert_eq!(factory.created_count(), 1);
        assert_eq!(factory.released_count(), 0);

        drop(client);
        assert_eq!(factory.released_count(), 1);
    }

    #[tokio::test]
    async fn test_startup_error() {
        let factory = MockProcessingClientFactory::new();
        factory.set_startup_error("no parser binary").await;

        let result = factory.create().await;
        assert!(matches!(result, Err(ClientError::Startup { .. })));
        assert_eq!(factory.created_count(), 0);
    }
}
