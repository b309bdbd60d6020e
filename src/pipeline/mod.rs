// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

mod batch;
mod failures;
mod header;
mod orchestrator;
mod progress;
mod worker;

pub use batch::sign_records;
pub use failures::{FailureLog, RowFailure};
pub use header::{SIGN_COLUMN, ensure_sign_column};
pub use orchestrator::SigningPipeline;
pub use progress::{PipelineStats, ProgressTracker};
pub use worker::{Job, SignedRecord, apply_signature};
