// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting for batch identification
// reference: uses indicatif for progress bars and tracks per-query outcomes

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub identified: usize,
    pub hedged: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.identified + self.hedged + self.failed
    }

    pub fn queries_per_second(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        self.total() as f64 * 1000.0 / self.duration_ms as f64
    }

    /// Percentage of queries that ran without error, hedges included.
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        ((total - self.failed) as f64 / total as f64) * 100.0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} identified, {} not identifiable, {} failed in {}ms",
            self.identified.to_string().green(),
            self.hedged.to_string().yellow(),
            self.failed.to_string().red(),
            self.duration_ms
        )
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    identified: Arc<AtomicUsize>,
    hedged: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total_queries: usize) -> Self {
        Self::with_color(total_queries, true)
    }

    pub fn with_color(total_queries: usize, colored: bool) -> Self {
        let multi_progress = MultiProgress::new();
        let main_bar = create_progress_bar(&multi_progress, total_queries as u64, colored);
        let detail_bar = create_detail_bar(&multi_progress);
        Self::from_bars(main_bar, detail_bar)
    }

    /// Counts outcomes without drawing anything.
    pub fn hidden(total_queries: usize) -> Self {
        let main_bar = ProgressBar::hidden();
        main_bar.set_length(total_queries as u64);
        Self::from_bars(main_bar, ProgressBar::hidden())
    }

    fn from_bars(main_bar: ProgressBar, detail_bar: ProgressBar) -> Self {
        Self {
            main_bar,
            detail_bar,
            identified: Arc::new(AtomicUsize::new(0)),
            hedged: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_identified(&self) {
        self.identified.fetch_add(1, Ordering::SeqCst);
        self.advance();
    }

    pub fn inc_hedged(&self) {
        self.hedged.fetch_add(1, Ordering::SeqCst);
        self.advance();
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.advance();
    }

    pub fn set_message(&self, message: String) {
        self.detail_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Batch complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> BatchStats {
        BatchStats {
            identified: self.identified.load(Ordering::SeqCst),
            hedged: self.hedged.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            duration_ms: self.start_time.elapsed().as_millis() as u64,
        }
    }

    fn advance(&self) {
        self.main_bar.inc(1);
        let message = format!(
            "Identified: {} | Hedges: {} | Failed: {}",
            self.identified.load(Ordering::SeqCst),
            self.hedged.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst)
        );
        self.detail_bar.set_message(message);
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    let (template, chars) = if colored {
        (
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            "█▓▒░",
        )
    } else {
        ("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) {msg}", "=>-")
    };
    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars);
    bar.set_style(style);
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    let style = ProgressStyle::default_bar()
        .template("{msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}
