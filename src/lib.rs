// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod csv_io;
pub mod error;
pub mod pipeline;
pub mod signer;
pub mod utils;

pub use config::{Config, IoConfig, PipelineConfig, SigningConfig};
pub use csv_io::{RecordSink, RecordSource};
pub use error::{PipelineError, Result};
pub use pipeline::{
    FailureLog, Job, PipelineStats, ProgressTracker, RowFailure, SIGN_COLUMN, SignedRecord,
    SigningPipeline, apply_signature, ensure_sign_column, sign_records,
};
pub use signer::{RsaPssSigner, Signer};
pub use utils::{OperationTimer, RowTemplate, Validator};
