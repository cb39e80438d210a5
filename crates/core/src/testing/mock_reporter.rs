//! Mock reporter for testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::pipes::{FetchEmitTuple, PipesReporter, PipesResult, PipesStatus};

/// A recorded report for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedReport {
    pub id: String,
    pub fetch_key: String,
    pub status: PipesStatus,
    pub elapsed: Duration,
}

/// Mock implementation of the PipesReporter trait.
///
/// Reports arrive synchronously from fetch workers, so recordings sit
/// behind a std mutex.
#[derive(Debug, Clone, Default)]
pub struct MockReporter {
    reports: Arc<Mutex<Vec<RecordedReport>>>,
}

impl MockReporter {
    /// Create a new mock reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded reports.
    pub fn reports(&self) -> Vec<RecordedReport> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of reports with the given status.
    pub fn count_with_status(&self, status: PipesStatus) -> usize {
        self.reports()
            .iter()
            .filter(|r| r.status == status)
            .count()
    }
}

impl PipesReporter for MockReporter {
    fn report(&self, tuple: &FetchEmitTuple, result: &PipesResult, elapsed: Duration) {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedReport {
                id: tuple.id().to_string(),
                fetch_key: tuple.fetch_key().fetch_key.clone(),
                status: result.status(),
                elapsed,
            });
    }
}
