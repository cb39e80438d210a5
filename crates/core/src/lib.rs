pub mod config;
pub mod metrics;
pub mod pipes;
pub mod processor;
pub mod testing;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use pipes::{
    ClientError, EmitData, EmitError, EmitKey, Emitter, FetchEmitTuple, FetchKey,
    LoggingReporter, Metadata, NoOpReporter, OnParseException, PipesReporter, PipesResult,
    PipesStatus, ProcessingClient, ProcessingClientFactory,
};
pub use processor::{
    AsyncProcessor, PipelineError, PipelinePhase, PipelineStatus, PoolStatus, ProcessorConfig,
    WorkerRole,
};
