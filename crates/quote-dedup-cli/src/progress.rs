use indicatif::{ProgressBar, ProgressStyle};
use quote_dedup_core::ProgressReporter;
use std::sync::Mutex;

/// CLI progress reporter using an indicatif bar over pair comparisons.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, total_pairs: u64) {
        let pb = ProgressBar::new(total_pairs);
        let style = ProgressStyle::with_template(
            "  {spinner:.cyan} Comparing [{bar:30.cyan/dim}] {pos}/{len} pairs ({eta} remaining)",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_scan_progress(&self, compared: u64, _total_pairs: u64) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                // Rows finish out of order; never move the bar backwards.
                if compared > pb.position() {
                    pb.set_position(compared);
                }
            }
        }
    }

    fn on_scan_complete(&self, pairs_found: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} candidate pairs in {:.2}s",
            pairs_found, duration_secs
        );
    }

    fn on_merge_complete(&self, deleted: usize) {
        eprintln!("  \x1b[32m✓\x1b[0m Merge complete: {} quotes deleted", deleted);
    }
}
