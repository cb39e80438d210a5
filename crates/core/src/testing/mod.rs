//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the pipeline's collaborator
//! traits, so the processor can be exercised end to end without a real
//! parser or destination.
//!
//! # Example
//!
//! ```rust,ignore
//! use docpipe_core::testing::{MockEmitter, MockOutcome, MockProcessingClientFactory};
//!
//! let factory = MockProcessingClientFactory::new();
//! let emitter = MockEmitter::new();
//!
//! // Configure mock responses
//! factory.set_outcome("doc-2", MockOutcome::IoError).await;
//!
//! // Build an AsyncProcessor with Arc::new(factory.clone()), ...
//! ```

mod mock_client;
mod mock_emitter;
mod mock_reporter;

pub use mock_client::{MockOutcome, MockProcessingClient, MockProcessingClientFactory};
pub use mock_emitter::MockEmitter;
pub use mock_reporter::{MockReporter, RecordedReport};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::pipes::{EmitKey, FetchEmitTuple, FetchKey, Metadata};

    /// Create a tuple whose id, fetch key and emit key are all `key`.
    pub fn tuple(key: &str) -> FetchEmitTuple {
        let mut metadata = Metadata::new();
        metadata.set("source", "fixture");
        FetchEmitTuple::with_id(key, FetchKey::new("fsf", key), EmitKey::new("fse", key))
            .with_metadata(metadata)
    }

    /// Create `count` tuples named `{prefix}-0` .. `{prefix}-{count - 1}`.
    pub fn tuples(prefix: &str, count: usize) -> Vec<FetchEmitTuple> {
        (0..count)
            .map(|i| tuple(&format!("{}-{}", prefix, i)))
            .collect()
    }
}
