// file: src/pipeline/header.rs
// description: header transformation ensuring the signature column exists
// reference: pure function, idempotent on conformant headers

use crate::error::{PipelineError, Result};

/// Name of the column that receives the base64 signature.
pub const SIGN_COLUMN: &str = "sign-String";

/// Ensures the header carries a `sign-String` column. When absent it is
/// inserted at position 1, shifting the remaining fields right; field 0
/// stays in place. Returns the transformed header and whether a column was
/// inserted, so row handling can mirror the layout change.
pub fn ensure_sign_column(header: &[String]) -> Result<(Vec<String>, bool)> {
    if header.is_empty() {
        return Err(PipelineError::EmptyHeader);
    }

    if header.iter().any(|column| column == SIGN_COLUMN) {
        return Ok((header.to_vec(), false));
    }

    let mut transformed = Vec::with_capacity(header.len() + 1);
    transformed.push(header[0].clone());
    transformed.push(SIGN_COLUMN.to_string());
    transformed.extend_from_slice(&header[1..]);
    Ok((transformed, true))
}
