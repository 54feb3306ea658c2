use indicatif::{ProgressBar, ProgressStyle};
use inventory_collator_core::{ProgressReporter, ScanPhase};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using an indicatif spinner. The number of files on
/// a volume is unknown until the walk ends, so the walk shows a running count.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn spinner(message: &'static str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICK_CHARS);
        pb.set_style(style);
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
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
    fn on_phase(&self, phase: ScanPhase) {
        match phase {
            ScanPhase::MarkingMissing => self.set_bar(Self::spinner("Marking catalog entries...")),
            ScanPhase::Walking => self.set_bar(Self::spinner("Scanning files...")),
            ScanPhase::Finalizing => self.set_bar(Self::spinner("Finalizing scan run...")),
            ScanPhase::Done | ScanPhase::NotStarted => self.finish_bar(),
        }
    }

    fn on_mark_missing(&self, marked: usize) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m {} previously active entries pending confirmation",
            marked
        );
    }

    fn on_file_processed(&self, files_seen: u64, relative_path: &str) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_message(format!("Scanning... {} files ({})", files_seen, relative_path));
            }
        }
    }

    fn on_walk_complete(&self, files_seen: u64, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Walk complete: {} files in {:.2}s",
            files_seen, duration_secs
        );
    }
}
