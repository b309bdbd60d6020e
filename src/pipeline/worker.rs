// file: src/pipeline/worker.rs
// description: signing workers transforming queued rows into signed records
// reference: N identical tasks share one job receiver; results fan back in

use crate::error::Result;
use crate::pipeline::failures::FailureLog;
use crate::pipeline::progress::ProgressTracker;
use crate::signer::Signer;
use crate::utils::template::RowTemplate;
use crate::utils::validation::Validator;
use std::sync::Arc;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Characters of the key field kept in failure details.
const DETAIL_MAX_LEN: usize = 64;

/// A data row awaiting transformation. `index` is the 1-based ordinal in
/// input order, used for failure context and order-preserving output.
#[derive(Debug)]
pub struct Job {
    pub index: u64,
    pub fields: Vec<String>,
}

/// A transformed row carrying its base64 signature in field 1.
#[derive(Debug)]
pub struct SignedRecord {
    pub index: u64,
    pub fields: Vec<String>,
}

/// Places the signature into a row, mirroring the header layout: when the
/// header column was inserted the signature is inserted at position 1 and
/// the remaining fields shift right; otherwise the row is padded to two
/// fields and field 1 is overwritten.
pub fn apply_signature(
    mut fields: Vec<String>,
    signature: String,
    column_inserted: bool,
) -> Vec<String> {
    if column_inserted {
        if fields.is_empty() {
            fields.push(String::new());
        }
        fields.insert(1, signature);
    } else {
        if fields.len() < 2 {
            fields.resize(2, String::new());
        }
        fields[1] = signature;
    }
    fields
}

/// State shared by all workers in a run.
pub(crate) struct TransformContext {
    pub signer: Arc<dyn Signer>,
    pub template: RowTemplate,
    pub column_inserted: bool,
    pub progress: Arc<ProgressTracker>,
    pub failures: Arc<FailureLog>,
    pub cancel: CancellationToken,
}

impl TransformContext {
    /// Renders the template from field 0 and signs the rendered bytes.
    fn sign_row(&self, job: &Job) -> Result<String> {
        let rendered = self.template.render(&job.fields[0]);
        self.signer.sign(rendered.as_bytes())
    }
}

pub(crate) fn spawn_workers(
    count: usize,
    jobs: Arc<Mutex<Receiver<Job>>>,
    results: Sender<SignedRecord>,
    context: Arc<TransformContext>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            let jobs = Arc::clone(&jobs);
            let results = results.clone();
            let context = Arc::clone(&context);
            tokio::spawn(worker_loop(worker_id, jobs, results, context))
        })
        .collect()
}

/// One worker: pop jobs until the queue closes or the run is cancelled.
/// A signing failure is recorded with its row context, cancels the run,
/// and ends this worker without draining remaining jobs.
async fn worker_loop(
    worker_id: usize,
    jobs: Arc<Mutex<Receiver<Job>>>,
    results: Sender<SignedRecord>,
    context: Arc<TransformContext>,
) {
    loop {
        let job = {
            let mut receiver = jobs.lock().await;
            // Biased so cancellation wins over a ready job.
            tokio::select! {
                biased;
                _ = context.cancel.cancelled() => None,
                job = receiver.recv() => job,
            }
        };

        let Some(job) = job else {
            break;
        };

        if job.fields.is_empty() {
            continue;
        }

        let signature = match context.sign_row(&job) {
            Ok(signature) => signature,
            Err(error) => {
                let detail = Validator::truncate_text(&job.fields[0], DETAIL_MAX_LEN);
                context.failures.record(job.index, detail, error);
                context.cancel.cancel();
                break;
            }
        };

        let fields = apply_signature(job.fields, signature, context.column_inserted);
        let record = SignedRecord {
            index: job.index,
            fields,
        };

        if results.send(record).await.is_err() {
            // Writer is gone; its own failure is already recorded.
            break;
        }

        context.progress.record_row();
    }

    debug!("Worker {} finished", worker_id);
}
