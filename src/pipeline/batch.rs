// file: src/pipeline/batch.rs
// description: in-memory signing of a full record set
// reference: same row semantics as the streaming pipeline, without queues

use crate::error::{PipelineError, Result};
use crate::pipeline::header::ensure_sign_column;
use crate::pipeline::worker::apply_signature;
use crate::signer::Signer;
use crate::utils::template::RowTemplate;

/// Signs every data row of an in-memory record set. The first record is the
/// header; rows with zero fields are dropped. Suited to small inputs where
/// the streaming pipeline is not worth the setup.
pub fn sign_records(
    records: &[Vec<String>],
    signer: &dyn Signer,
    template: &RowTemplate,
) -> Result<Vec<Vec<String>>> {
    let Some(header) = records.first() else {
        return Ok(Vec::new());
    };

    let (header, column_inserted) = ensure_sign_column(header)?;

    let mut output = Vec::with_capacity(records.len());
    output.push(header);

    for (offset, record) in records[1..].iter().enumerate() {
        if record.is_empty() {
            continue;
        }

        let rendered = template.render(&record[0]);
        let signature = signer.sign(rendered.as_bytes()).map_err(|error| {
            PipelineError::Sign(format!("row {}: {}", offset + 1, error))
        })?;

        output.push(apply_signature(record.clone(), signature, column_inserted));
    }

    Ok(output)
}
