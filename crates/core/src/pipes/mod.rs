//! Work items, results, and the collaborator contracts of the pipeline.
//!
//! The pipeline never parses documents itself. It hands each
//! [`FetchEmitTuple`] to a [`ProcessingClient`], forwards the resulting
//! [`EmitData`] to an [`Emitter`], and tells a [`PipesReporter`] how every
//! tuple went.

mod error;
mod reporter;
mod traits;
mod types;

pub use error::{ClientError, EmitError};
pub use reporter::{LoggingReporter, NoOpReporter};
pub use traits::{Emitter, PipesReporter, ProcessingClient, ProcessingClientFactory};
pub use types::{
    EmitData, EmitKey, FetchEmitTuple, FetchKey, Metadata, OnParseException, PipesResult,
    PipesStatus,
};
