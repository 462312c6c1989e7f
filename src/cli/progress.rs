//! Progress bar and summary reporting for CLI downloads.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::format::{format_bytes, format_duration};
use crate::progress::{BAR_WIDTH, DownloadProgress, TransferProgress};
use crate::stats::{FileStats, WalkSummary};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates a progress bar for a single file download, or a spinner when the
/// size was not announced.
pub fn make_progress_bar(total: Option<u64>, name: &str) -> ProgressBar {
    let bar = match total {
        Some(size) => {
            let bar = ProgressBar::new(size);
            bar.set_style(
                ProgressStyle::with_template(&format!(
                    "Downloading: |{{bar:{BAR_WIDTH}.cyan/blue}}| {{percent}}% \
                     {{bytes}}/{{total_bytes}} @ {{bytes_per_sec}} - {{msg}}"
                ))
                .expect("progress template is valid")
                .progress_chars("█-"),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} Downloading: {bytes} @ {bytes_per_sec} - {msg}",
                )
                .expect("spinner template is valid"),
            );
            bar
        }
    };
    bar.set_message(name.to_string());
    bar.enable_steady_tick(Duration::from_millis(250));
    bar
}

struct ActiveBar {
    bar: ProgressBar,
    transfer: TransferProgress,
}

/// Terminal progress reporter drawing one bar per file.
///
/// Files are fetched one at a time, so at most one bar is live.
#[derive(Default)]
pub struct IndicatifProgress {
    active: Mutex<Option<ActiveBar>>,
}

impl IndicatifProgress {
    /// Creates a reporter with no active bar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn take(&self) -> Option<ActiveBar> {
        self.active.lock().ok().and_then(|mut active| active.take())
    }
}

impl DownloadProgress for IndicatifProgress {
    fn on_file_start(&self, name: &str, total: Option<u64>) {
        let transfer = TransferProgress::new(name, total);
        let bar = make_progress_bar(transfer.total(), name);
        if let Ok(mut active) = self.active.lock()
            && let Some(previous) = active.replace(ActiveBar { bar, transfer })
        {
            previous.bar.finish_and_clear();
        }
    }

    fn on_progress(&self, _name: &str, bytes: u64) {
        let Ok(mut active) = self.active.lock() else {
            return;
        };
        let Some(ActiveBar { bar, transfer }) = active.as_mut() else {
            return;
        };
        bar.inc(bytes);
        if let Some(remaining) = transfer.advance(bytes).and_then(|s| s.remaining_gb) {
            bar.set_message(format!("{} (Remaining: {remaining:.2} GB)", transfer.label()));
        }
    }

    fn on_file_complete(&self, name: &str, stats: &FileStats) {
        if let Some(ActiveBar { bar, .. }) = self.take() {
            bar.println(format!(
                "  {name} - {} in {} ({}/s avg)",
                format_bytes(stats.size),
                format_duration(stats.elapsed),
                format_bytes(stats.average_speed),
            ));
            bar.finish_and_clear();
        }
    }

    fn on_error(&self, _name: &str, _error: &str) {
        if let Some(ActiveBar { bar, .. }) = self.take() {
            bar.abandon();
        }
    }
}

/// Prints a summary of the walk.
pub fn print_summary(summary: &WalkSummary) {
    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");

    if summary.files_downloaded > 0 {
        println!("  Files downloaded:  {}", summary.files_downloaded);
        println!(
            "  Total size:        {}",
            format_bytes(summary.bytes_downloaded)
        );
        println!("  Total time:        {}", format_duration(summary.elapsed));
        println!(
            "  Average speed:     {}/s",
            format_bytes(summary.average_speed())
        );
    } else {
        println!("  No new files downloaded.");
    }

    if summary.files_skipped > 0 {
        println!("  Files skipped:     {} (already exist)", summary.files_skipped);
    }
    if summary.files_failed > 0 {
        println!("  Files failed:      {}", summary.files_failed);
    }
    if summary.branches_failed > 0 {
        println!("  Folders failed:    {}", summary.branches_failed);
    }
    for failure in &summary.failures {
        println!("    {} - {}", failure.target, failure.reason);
    }

    println!("{SEPARATOR}");
}
