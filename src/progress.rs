// Upload progress display. The worker pool only emits events through
// `ProgressObserver`; nothing here can influence the transfer itself.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Receives part-level events from the worker pool. Called from worker
/// threads, so implementations must be thread safe.
pub trait ProgressObserver: Send + Sync {
    fn started(&self, _total_parts: usize) {}
    fn part_completed(&self, _part_number: usize) {}
    fn finished(&self) {}
}

/// Observer that ignores everything.
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Terminal progress bar with a parts counter and an ETA message.
pub struct ProgressReporter {
    bar: ProgressBar,
    completed: AtomicUsize,
    total: AtomicUsize,
    start: OnceLock<Instant>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// Build around an existing bar, e.g. `ProgressBar::hidden()`.
    pub fn with_bar(bar: ProgressBar) -> Self {
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} parts {msg}",
        ) {
            bar.set_style(style.progress_chars("=> "));
        }
        ProgressReporter {
            bar,
            completed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            start: OnceLock::new(),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressReporter {
    fn started(&self, total_parts: usize) {
        self.total.store(total_parts, Ordering::SeqCst);
        let _ = self.start.set(Instant::now());
        self.bar.set_length(total_parts as u64);
    }

    fn part_completed(&self, _part_number: usize) {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.bar.inc(1);
        let total = self.total.load(Ordering::SeqCst);
        let elapsed = self.start.get().map(Instant::elapsed).unwrap_or_default();
        let eta = estimate_remaining(total.saturating_sub(done), elapsed, done);
        self.bar.set_message(format!("ETA: {}s", eta.as_secs()));
    }

    fn finished(&self) {
        self.bar.finish();
    }
}

/// `remaining * (elapsed / completed)`, rounded to whole seconds.
pub fn estimate_remaining(remaining: usize, elapsed: Duration, completed: usize) -> Duration {
    if completed == 0 {
        return Duration::ZERO;
    }
    let per_part = elapsed.as_secs_f64() / completed as f64;
    Duration::from_secs((per_part * remaining as f64).round() as u64)
}
