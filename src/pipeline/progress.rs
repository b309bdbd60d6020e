// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting for pipeline execution
// reference: uses indicatif for progress bars and tracks processing metrics

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Rows between progress-bar position updates. The final row always
/// triggers an update so short runs still reach 100%.
const PROGRESS_INTERVAL: u64 = 1000;

#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub total_rows: u64,
    pub rows_signed: u64,
    pub rows_written: u64,
    pub duration_secs: f64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows_per_second(&self) -> f64 {
        if self.duration_secs == 0.0 {
            return 0.0;
        }
        self.rows_written as f64 / self.duration_secs
    }

    pub fn completion_rate(&self) -> f64 {
        if self.total_rows == 0 {
            return 100.0;
        }
        (self.rows_signed as f64 / self.total_rows as f64) * 100.0
    }
}

/// Row counter plus progress bar, shared by all signing workers. The bar is
/// refreshed every [`PROGRESS_INTERVAL`] rows and at the final row rather
/// than on every increment.
pub struct ProgressTracker {
    bar: ProgressBar,
    total_rows: u64,
    rows_signed: AtomicU64,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total_rows: u64) -> Self {
        Self::with_color(total_rows, true)
    }

    pub fn with_color(total_rows: u64, colored: bool) -> Self {
        Self::from_bar(create_progress_bar(total_rows, colored), total_rows)
    }

    /// Tracker without a visible bar, for tests and quiet runs. Counters
    /// behave identically.
    pub fn hidden(total_rows: u64) -> Self {
        Self::from_bar(ProgressBar::hidden(), total_rows)
    }

    fn from_bar(bar: ProgressBar, total_rows: u64) -> Self {
        bar.set_length(total_rows);
        Self {
            bar,
            total_rows,
            rows_signed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Counts one signed row and returns the running total.
    pub fn record_row(&self) -> u64 {
        let current = self.rows_signed.fetch_add(1, Ordering::SeqCst) + 1;
        if current % PROGRESS_INTERVAL == 0 || current == self.total_rows {
            self.bar.set_position(current);
        }
        current
    }

    pub fn rows_signed(&self) -> u64 {
        self.rows_signed.load(Ordering::SeqCst)
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.set_position(self.rows_signed());
        self.bar.finish_and_clear();
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            total_rows: self.total_rows,
            rows_signed: self.rows_signed(),
            rows_written: 0,
            duration_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(total: u64, colored: bool) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if colored {
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({percent}%) {msg}",
                )
                .expect("Failed to create progress bar template")
                .progress_chars("█▓▒░"),
        );
    } else {
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} rows ({percent}%) {msg}")
                .expect("Failed to create progress bar template")
                .progress_chars("=>-"),
        );
    }
    bar
}
