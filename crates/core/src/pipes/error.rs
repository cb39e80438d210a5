//! Error types for the external collaborators of the pipeline.

use thiserror::Error;

/// Errors raised by a processing client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport or child-process I/O failure while processing one tuple.
    ///
    /// The fetch worker turns this into an unspecified-crash result and
    /// keeps going.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client could not be created.
    #[error("Failed to start processing client: {reason}")]
    Startup { reason: String },

    /// The client is unusable; the owning worker stops.
    #[error("Processing client failed: {reason}")]
    Fatal { reason: String },
}

impl ClientError {
    /// Creates a startup error.
    pub fn startup(reason: impl Into<String>) -> Self {
        Self::Startup {
            reason: reason.into(),
        }
    }

    /// Creates a fatal error.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    /// Whether the failure is confined to the tuple being processed.
    pub fn is_per_item(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Errors raised by an emitter.
#[derive(Debug, Error)]
pub enum EmitError {
    /// Delivering one payload failed.
    #[error("Emit failed for {emit_key}: {reason}")]
    Failed { emit_key: String, reason: String },

    /// I/O error while writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The destination is gone for good; the emit worker stops.
    #[error("Emitter is unavailable: {reason}")]
    Unrecoverable { reason: String },
}

impl EmitError {
    /// Creates a per-payload failure.
    pub fn failed(emit_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            emit_key: emit_key.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unrecoverable failure.
    pub fn unrecoverable(reason: impl Into<String>) -> Self {
        Self::Unrecoverable {
            reason: reason.into(),
        }
    }

    /// Whether the emit worker must stop after this error.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Unrecoverable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        let io = ClientError::from(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "child exited",
        ));
        assert!(io.is_per_item());
        assert!(!ClientError::fatal("jvm gone").is_per_item());
        assert!(!ClientError::startup("no binary").is_per_item());
    }

    #[test]
    fn test_emit_error_classification() {
        assert!(EmitError::unrecoverable("bucket deleted").is_unrecoverable());
        assert!(!EmitError::failed("a.json", "503").is_unrecoverable());
        assert!(!EmitError::from(std::io::Error::other("short write")).is_unrecoverable());
    }

    #[test]
    fn test_error_display() {
        let err = EmitError::failed("out/a.json", "disk full");
        assert_eq!(err.to_string(), "Emit failed for out/a.json: disk full");
    }
}
