// file: src/pipeline/failures.rs
// description: thread-safe collection of per-row failures
// reference: every failure keeps its row ordinal; the first one becomes the run error

use crate::error::PipelineError;
use std::sync::Mutex;
use tracing::warn;

/// A single recorded failure. `row` is the 1-based data-row ordinal and
/// `detail` carries the row's key field when one is available.
#[derive(Debug)]
pub struct RowFailure {
    pub row: u64,
    pub detail: String,
    pub error: PipelineError,
}

/// Shared failure list for all pipeline stages. Recording never blocks the
/// pipeline for long: entries are pushed under a short-lived lock.
#[derive(Debug, Default)]
pub struct FailureLog {
    entries: Mutex<Vec<RowFailure>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, row: u64, detail: impl Into<String>, error: PipelineError) {
        let detail = detail.into();
        if detail.is_empty() {
            warn!("Row {} failed: {}", row, error);
        } else {
            warn!("Row {} ({}) failed: {}", row, detail, error);
        }

        self.lock_entries().push(RowFailure { row, detail, error });
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Takes all recorded failures in recording order, leaving the log empty.
    pub fn take(&self) -> Vec<RowFailure> {
        std::mem::take(&mut *self.lock_entries())
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Vec<RowFailure>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
