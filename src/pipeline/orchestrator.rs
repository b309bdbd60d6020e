// file: src/pipeline/orchestrator.rs
// description: coordinates the reader, signing workers, and writer of a run
// reference: bounded queues between one producer, N workers, one writer

use crate::config::Config;
use crate::csv_io::{self, RecordSink, RecordSource};
use crate::error::{PipelineError, Result};
use crate::pipeline::failures::FailureLog;
use crate::pipeline::header::ensure_sign_column;
use crate::pipeline::progress::{PipelineStats, ProgressTracker};
use crate::pipeline::worker::{Job, SignedRecord, TransformContext, spawn_workers};
use crate::signer::Signer;
use crate::utils::telemetry::OperationTimer;
use crate::utils::template::RowTemplate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Streams a CSV file through a pool of signing workers into a new file.
///
/// One blocking producer reads rows into a bounded job queue, `workers`
/// tasks sign them, and a single blocking writer serializes the results.
/// The bounded queues are the only backpressure mechanism, so memory stays
/// proportional to the queue capacity rather than the input size.
pub struct SigningPipeline {
    config: Config,
    signer: Arc<dyn Signer>,
    template: RowTemplate,
    colored: bool,
    progress_enabled: bool,
}

impl SigningPipeline {
    pub fn new(config: Config, signer: Arc<dyn Signer>) -> Result<Self> {
        let template = RowTemplate::parse(&config.signing.template)?;
        Ok(Self {
            config,
            signer,
            template,
            colored: true,
            progress_enabled: true,
        })
    }

    pub fn with_color(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress_enabled = enabled;
        self
    }

    pub async fn run(&self) -> Result<PipelineStats> {
        let timer = OperationTimer::new("csv signing");
        let input = self.config.io.input.clone();
        let output = self.config.io.output.clone();
        let workers = self.config.pipeline.workers.max(1);
        let capacity = self.config.pipeline.queue_capacity.max(1);

        info!("Scanning {} for row count", input.display());
        let total_lines = {
            let path = input.clone();
            tokio::task::spawn_blocking(move || csv_io::count_lines(&path))
                .await
                .map_err(|e| PipelineError::Task(format!("line count task failed: {}", e)))??
        };
        let total_rows = total_lines.saturating_sub(1);
        timer.checkpoint(&format!("{} data rows to process", total_rows));

        let mut source = RecordSource::open(&input)?;
        let mut sink = RecordSink::create(&output)?;

        let header = source.next_record()?.ok_or(PipelineError::EmptyHeader)?;
        let (header, column_inserted) = ensure_sign_column(&header)?;
        sink.write_record(&header)?;
        debug!("Header written ({} columns)", header.len());

        let progress = Arc::new(if self.progress_enabled {
            ProgressTracker::with_color(total_rows, self.colored)
        } else {
            ProgressTracker::hidden(total_rows)
        });
        let failures = Arc::new(FailureLog::new());
        let cancel = CancellationToken::new();

        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(capacity);
        let (results_tx, results_rx) = mpsc::channel::<SignedRecord>(capacity);

        info!("Streaming rows through {} signing workers", workers);

        let producer = spawn_producer(source, jobs_tx, Arc::clone(&failures), cancel.clone());

        let context = Arc::new(TransformContext {
            signer: Arc::clone(&self.signer),
            template: self.template.clone(),
            column_inserted,
            progress: Arc::clone(&progress),
            failures: Arc::clone(&failures),
            cancel: cancel.clone(),
        });
        let worker_handles = spawn_workers(
            workers,
            Arc::new(Mutex::new(jobs_rx)),
            results_tx,
            context,
        );

        let writer = spawn_writer(
            sink,
            results_rx,
            self.config.pipeline.flush_every.max(1),
            self.config.pipeline.preserve_order,
            Arc::clone(&failures),
            cancel.clone(),
        );

        let rows_read = producer
            .await
            .map_err(|e| PipelineError::Task(format!("producer task failed: {}", e)))?;
        for handle in worker_handles {
            handle
                .await
                .map_err(|e| PipelineError::Task(format!("worker task failed: {}", e)))?;
        }
        let rows_written = writer
            .await
            .map_err(|e| PipelineError::Task(format!("writer task failed: {}", e)))?;
        debug!("Producer submitted {} rows", rows_read);

        progress.finish();
        let elapsed = timer.finish_with_count(rows_written as usize);

        let mut recorded = failures.take();
        if !recorded.is_empty() {
            error!("{} failure(s) recorded; returning the first", recorded.len());
            let first = recorded.remove(0);
            return Err(first.error);
        }

        let mut stats = progress.stats();
        stats.rows_written = rows_written;
        stats.duration_secs = elapsed.as_secs_f64();
        self.log_final_stats(&stats);

        Ok(stats)
    }

    fn log_final_stats(&self, stats: &PipelineStats) {
        info!("=== Signing Run Summary ===");
        info!("Rows expected: {}", stats.total_rows);
        info!("Rows signed: {}", stats.rows_signed);
        info!("Rows written: {}", stats.rows_written);
        info!("Completion: {:.1}%", stats.completion_rate());
        info!("Duration: {:.2}s", stats.duration_secs);
        info!("Throughput: {:.2} rows/sec", stats.rows_per_second());
        info!("===========================");
    }
}

/// Reads records sequentially and feeds the job queue, blocking when the
/// queue is full. Blank rows are dropped before ordinals are assigned so
/// the sequence stays gapless for order-preserving output.
fn spawn_producer(
    mut source: RecordSource,
    jobs: mpsc::Sender<Job>,
    failures: Arc<FailureLog>,
    cancel: CancellationToken,
) -> JoinHandle<u64> {
    tokio::task::spawn_blocking(move || {
        let mut index: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match source.next_record() {
                Ok(Some(fields)) => {
                    if fields.is_empty() {
                        continue;
                    }
                    index += 1;
                    if jobs.blocking_send(Job { index, fields }).is_err() {
                        // All workers exited; nothing left to feed.
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    failures.record(index + 1, "", error);
                    cancel.cancel();
                    break;
                }
            }
        }
        index
    })
}

/// Serializes signed records as they arrive, flushing every `flush_every`
/// rows. In order-preserving mode records are staged until their ordinal
/// is next, then emitted strictly sequentially.
fn spawn_writer(
    mut sink: RecordSink,
    mut results: mpsc::Receiver<SignedRecord>,
    flush_every: u64,
    preserve_order: bool,
    failures: Arc<FailureLog>,
    cancel: CancellationToken,
) -> JoinHandle<u64> {
    tokio::task::spawn_blocking(move || {
        let mut staged: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        let mut next_index: u64 = 1;
        let mut written: u64 = 0;

        while let Some(record) = results.blocking_recv() {
            let ready = if preserve_order {
                stage_in_order(&mut staged, &mut next_index, record)
            } else {
                vec![record]
            };

            for record in ready {
                if let Err(error) = sink.write_record(&record.fields) {
                    failures.record(record.index, "", error);
                    cancel.cancel();
                    return written;
                }
                written += 1;

                if written % flush_every == 0 {
                    if let Err(error) = sink.flush() {
                        failures.record(record.index, "", error);
                        cancel.cancel();
                        return written;
                    }
                }
            }
        }

        if !staged.is_empty() {
            // Only reachable after a cancellation left gaps in the sequence.
            debug!("Dropping {} staged rows after failure", staged.len());
        }

        if let Err(error) = sink.flush() {
            failures.record(written, "", error);
            cancel.cancel();
        }
        written
    })
}

/// Stages a record and pops the run of consecutively-ordered records that
/// became emittable, advancing `next_index` past them.
fn stage_in_order(
    staged: &mut BTreeMap<u64, Vec<String>>,
    next_index: &mut u64,
    record: SignedRecord,
) -> Vec<SignedRecord> {
    staged.insert(record.index, record.fields);

    let mut ready = Vec::new();
    while let Some(fields) = staged.remove(next_index) {
        ready.push(SignedRecord {
            index: *next_index,
            fields,
        });
        *next_index += 1;
    }
    ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IoConfig, PipelineConfig, SigningConfig};
    use crate::signer::RsaPssSigner;
    use crate::signer::test_keys::RSA_PKCS8_PEM;
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use pretty_assertions::assert_eq;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::pss::Signature;
    use rsa::signature::Verifier;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    struct StubSigner;

    impl Signer for StubSigner {
        fn sign(&self, data: &[u8]) -> Result<String> {
            Ok(format!("sig:{}", String::from_utf8_lossy(data)))
        }
    }

    struct FailingSigner;

    impl Signer for FailingSigner {
        fn sign(&self, _data: &[u8]) -> Result<String> {
            Err(PipelineError::Sign("stub failure".to_string()))
        }
    }

    fn test_config(temp: &TempDir, workers: usize) -> Config {
        Config {
            io: IoConfig {
                input: temp.path().join("input.csv"),
                output: temp.path().join("output.csv"),
            },
            signing: SigningConfig {
                key_path: temp.path().join("key.pem"),
                template: "t={}".to_string(),
            },
            pipeline: PipelineConfig {
                workers,
                queue_capacity: 1000,
                flush_every: 1000,
                preserve_order: false,
            },
        }
    }

    fn write_input(config: &Config, content: &str) {
        fs::write(&config.io.input, content).unwrap();
    }

    async fn run_pipeline(config: Config, signer: Arc<dyn Signer>) -> Result<PipelineStats> {
        SigningPipeline::new(config, signer)
            .unwrap()
            .with_progress(false)
            .run()
            .await
    }

    fn record(index: u64, value: &str) -> SignedRecord {
        SignedRecord {
            index,
            fields: vec![value.to_string()],
        }
    }

    #[test]
    fn test_stage_in_order_buffers_until_gap_closes() {
        let mut staged = BTreeMap::new();
        let mut next_index = 1;

        assert!(stage_in_order(&mut staged, &mut next_index, record(2, "b")).is_empty());
        assert!(stage_in_order(&mut staged, &mut next_index, record(3, "c")).is_empty());

        let ready = stage_in_order(&mut staged, &mut next_index, record(1, "a"));
        let values: Vec<_> = ready.iter().map(|r| r.fields[0].as_str()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
        assert_eq!(next_index, 4);
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn test_single_worker_preserves_input_order() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 1);
        write_input(&config, "trade_no,amount\na,1\nb,2\nc,3\nd,4\ne,5\n");
        let output_path = config.io.output.clone();

        let stats = run_pipeline(config, Arc::new(StubSigner)).await.unwrap();
        assert_eq!(stats.rows_written, 5);
        assert_eq!(stats.rows_signed, 5);
        assert_eq!(stats.total_rows, 5);

        let records = csv_io::read_records(&output_path).unwrap();
        assert_eq!(records[0], vec!["trade_no", "sign-String", "amount"]);

        let rows: Vec<Vec<&str>> = records[1..]
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect();
        assert_eq!(
            rows,
            vec![
                vec!["a", "sig:t=a", "1"],
                vec!["b", "sig:t=b", "2"],
                vec!["c", "sig:t=c", "3"],
                vec!["d", "sig:t=d", "4"],
                vec!["e", "sig:t=e", "5"],
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_run_preserves_row_multiset() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 4);

        let mut input = String::from("trade_no,amount\n");
        for i in 0..100 {
            input.push_str(&format!("row{},{}\n", i, i));
        }
        write_input(&config, &input);
        let output_path = config.io.output.clone();

        let stats = run_pipeline(config, Arc::new(StubSigner)).await.unwrap();
        assert_eq!(stats.rows_written, 100);
        assert_eq!(stats.rows_signed, stats.total_rows);

        let records = csv_io::read_records(&output_path).unwrap();
        assert_eq!(records.len(), 101);

        let mut keys: Vec<String> = records[1..].iter().map(|r| r[0].clone()).collect();
        keys.sort();
        let mut expected: Vec<String> = (0..100).map(|i| format!("row{}", i)).collect();
        expected.sort();
        assert_eq!(keys, expected);

        for row in &records[1..] {
            assert_eq!(row.len(), 3);
            assert_eq!(row[1], format!("sig:t={}", row[0]));
        }
    }

    #[tokio::test]
    async fn test_preserve_order_with_many_workers() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp, 8);
        config.pipeline.preserve_order = true;
        config.pipeline.queue_capacity = 16;

        let mut input = String::from("trade_no\n");
        for i in 0..200 {
            input.push_str(&format!("row{}\n", i));
        }
        write_input(&config, &input);
        let output_path = config.io.output.clone();

        let stats = run_pipeline(config, Arc::new(StubSigner)).await.unwrap();
        assert_eq!(stats.rows_written, 200);

        let records = csv_io::read_records(&output_path).unwrap();
        let keys: Vec<&str> = records[1..].iter().map(|r| r[0].as_str()).collect();
        let expected: Vec<String> = (0..200).map(|i| format!("row{}", i)).collect();
        assert_eq!(keys, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_existing_sign_column_is_overwritten_in_place() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 2);
        write_input(
            &config,
            "trade_no,sign-String,amount\n1,stale,10\n2,stale,20\n",
        );
        let output_path = config.io.output.clone();

        run_pipeline(config, Arc::new(StubSigner)).await.unwrap();

        let records = csv_io::read_records(&output_path).unwrap();
        assert_eq!(records[0], vec!["trade_no", "sign-String", "amount"]);
        for row in &records[1..] {
            assert_eq!(row.len(), 3);
            assert_eq!(row[1], format!("sig:t={}", row[0]));
        }
    }

    #[tokio::test]
    async fn test_short_rows_are_padded() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 2);
        write_input(&config, "trade_no\na\nb\n");
        let output_path = config.io.output.clone();

        run_pipeline(config, Arc::new(StubSigner)).await.unwrap();

        let records = csv_io::read_records(&output_path).unwrap();
        assert_eq!(records[0], vec!["trade_no", "sign-String"]);
        for row in &records[1..] {
            assert_eq!(row.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_empty_input_fails_with_shape_error() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 2);
        write_input(&config, "");
        let output_path = config.io.output.clone();

        let result = run_pipeline(config, Arc::new(StubSigner)).await;
        assert!(matches!(result, Err(PipelineError::EmptyHeader)));

        // The output file was created before the header was read.
        assert!(output_path.exists());
        assert!(csv_io::read_records(&output_path).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 2);
        write_input(&config, "trade_no\n\na\n\nb\n");
        let output_path = config.io.output.clone();

        let stats = run_pipeline(config, Arc::new(StubSigner)).await.unwrap();
        assert_eq!(stats.rows_written, 2);

        let records = csv_io::read_records(&output_path).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_failing_signer_cancels_promptly() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp, 2);
        config.pipeline.queue_capacity = 2;

        let mut input = String::from("trade_no\n");
        for i in 0..50 {
            input.push_str(&format!("row{}\n", i));
        }
        write_input(&config, &input);

        // A hung run would mean the producer stayed blocked on the full
        // job queue after the workers died.
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            run_pipeline(config, Arc::new(FailingSigner)),
        )
        .await
        .expect("pipeline did not terminate after signing failure");

        assert!(matches!(result, Err(PipelineError::Sign(_))));
    }

    #[tokio::test]
    async fn test_signatures_verify_against_public_key() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp, 4);
        config.pipeline.preserve_order = true;
        write_input(&config, "trade_no,amount\n1001,10\n1002,20\n1003,30\n");
        let output_path = config.io.output.clone();

        let key = RsaPrivateKey::from_pkcs8_pem(RSA_PKCS8_PEM).unwrap();
        let signer = RsaPssSigner::new(key);
        let verifying_key = signer.verifying_key();

        run_pipeline(config, Arc::new(signer)).await.unwrap();

        let records = csv_io::read_records(&output_path).unwrap();
        assert_eq!(records[0], vec!["trade_no", "sign-String", "amount"]);
        assert_eq!(records.len(), 4);

        for (i, row) in records[1..].iter().enumerate() {
            assert_eq!(row[0], format!("100{}", i + 1));
            let payload = format!("t={}", row[0]);
            let raw = BASE64.decode(&row[1]).unwrap();
            let signature = Signature::try_from(raw.as_slice()).unwrap();
            verifying_key
                .verify(payload.as_bytes(), &signature)
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_output_creation() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 2);
        let output_path = config.io.output.clone();

        let result = run_pipeline(config, Arc::new(StubSigner)).await;
        assert!(matches!(result, Err(PipelineError::FileOperation { .. })));
        assert!(!output_path.exists());
    }

    #[test]
    fn test_rejects_invalid_template() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp, 2);
        config.signing.template = "no placeholder".to_string();

        let result = SigningPipeline::new(config, Arc::new(StubSigner));
        assert!(matches!(result, Err(PipelineError::Template(_))));
    }
}
