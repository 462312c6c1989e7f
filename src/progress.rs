//! Transfer progress tracking and reporting.

use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::format::{GIB, MIB, format_bytes};
use crate::stats::FileStats;

/// Number of cells in the rendered bar.
pub const BAR_WIDTH: usize = 50;

/// Trait for receiving download progress updates.
///
/// All methods have default no-op implementations, so implementors only
/// override the events they care about.
pub trait DownloadProgress: Send + Sync {
    /// Called when a transfer starts. `total` is `None` when the server did
    /// not announce a size.
    fn on_file_start(&self, _name: &str, _total: Option<u64>) {}

    /// Called for every piece written, with the size of that piece.
    fn on_progress(&self, _name: &str, _bytes: u64) {}

    /// Called when a file download completes successfully.
    fn on_file_complete(&self, _name: &str, _stats: &FileStats) {}

    /// Called when a file is left alone because it already exists.
    fn on_skipped(&self, _name: &str) {}

    /// Called when a file download fails.
    fn on_error(&self, _name: &str, _error: &str) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Point-in-time view of a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes transferred so far.
    pub transferred: u64,
    /// Announced total, if any.
    pub total: Option<u64>,
    /// Average throughput since the start, in MB/s.
    pub speed_mb_per_sec: f64,
    /// Volume still to come, in GB. `None` when the total is unknown.
    pub remaining_gb: Option<f64>,
    /// Completion percentage. `None` when the total is unknown.
    pub percent: Option<f64>,
    /// Filled cells of a [`BAR_WIDTH`]-cell bar. `None` when the total is unknown.
    pub filled: Option<usize>,
}

impl ProgressSnapshot {
    /// Renders the bar cells, `█` for done and `-` for pending.
    #[must_use]
    pub fn bar(&self) -> Option<String> {
        self.filled
            .map(|filled| format!("{}{}", "█".repeat(filled), "-".repeat(BAR_WIDTH - filled)))
    }

    /// Renders the single status line shown while downloading.
    #[must_use]
    pub fn render(&self, label: &str) -> String {
        match (self.bar(), self.percent, self.remaining_gb) {
            (Some(bar), Some(percent), Some(remaining)) => format!(
                "{label}: |{bar}| {percent:.2}% Speed: {:.2} MB/s Remaining: {remaining:.2} GB",
                self.speed_mb_per_sec
            ),
            _ => format!(
                "{label}: {} Speed: {:.2} MB/s",
                format_bytes(self.transferred),
                self.speed_mb_per_sec
            ),
        }
    }
}

/// Tracks bytes transferred against an optional total.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    label: String,
    total: Option<u64>,
    transferred: u64,
    started: Instant,
}

impl TransferProgress {
    /// Starts tracking a transfer. A total of zero is treated as unknown.
    #[must_use]
    pub fn new(label: impl Into<String>, total: Option<u64>) -> Self {
        Self {
            label: label.into(),
            total: total.filter(|&t| t > 0),
            transferred: 0,
            started: Instant::now(),
        }
    }

    /// Label shown in front of the bar.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Bytes transferred so far.
    #[must_use]
    pub const fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Known total size.
    #[must_use]
    pub const fn total(&self) -> Option<u64> {
        self.total
    }

    /// Returns `true` once a known total has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total.is_some_and(|t| self.transferred >= t)
    }

    /// Adds `bytes` and returns a fresh snapshot, or `None` if no time has
    /// elapsed yet.
    pub fn advance(&mut self, bytes: u64) -> Option<ProgressSnapshot> {
        self.advance_at(bytes, Instant::now())
    }

    fn advance_at(&mut self, bytes: u64, now: Instant) -> Option<ProgressSnapshot> {
        self.transferred = self.transferred.saturating_add(bytes);
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed == Duration::ZERO {
            return None;
        }
        Some(self.snapshot(elapsed))
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn snapshot(&self, elapsed: Duration) -> ProgressSnapshot {
        let current = self.transferred as f64;
        let speed_mb_per_sec = current / elapsed.as_secs_f64() / MIB as f64;
        let (remaining_gb, percent, filled) = self.total.map_or((None, None, None), |total| {
            let total_f = total as f64;
            let remaining = total.saturating_sub(self.transferred) as f64 / GIB as f64;
            let percent = 100.0 * current / total_f;
            let filled = ((BAR_WIDTH as f64 * current / total_f) as usize).min(BAR_WIDTH);
            (Some(remaining), Some(percent), Some(filled))
        });

        ProgressSnapshot {
            transferred: self.transferred,
            total: self.total,
            speed_mb_per_sec,
            remaining_gb,
            percent,
            filled,
        }
    }
}

#[derive(Debug, Default)]
struct LineState {
    transfer: Option<TransferProgress>,
    line_open: bool,
}

/// Rewrites a single terminal line in place while a file downloads.
///
/// Lines are prefixed with `\r`; a newline ends the line once the file
/// completes, fails, or reaches its announced size.
pub struct LineProgress<W: Write + Send> {
    label: String,
    state: Mutex<LineState>,
    out: Mutex<W>,
}

impl LineProgress<std::io::Stderr> {
    /// Renders to standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> LineProgress<W> {
    /// Renders to `out` with the default `Downloading` label.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self::with_label(out, "Downloading")
    }

    /// Renders to `out` with a custom label.
    #[must_use]
    pub fn with_label(out: W, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(LineState::default()),
            out: Mutex::new(out),
        }
    }

    /// Returns the underlying writer.
    ///
    /// # Panics
    ///
    /// Panics if a reporting thread panicked while holding the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().expect("progress writer poisoned")
    }

    fn write(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            // Progress output is best effort; a closed terminal must not fail the download.
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
    }

    fn close_line(&self, state: &mut LineState) {
        if state.line_open {
            state.line_open = false;
            self.write("\n");
        }
    }
}

impl<W: Write + Send> DownloadProgress for LineProgress<W> {
    fn on_file_start(&self, _name: &str, total: Option<u64>) {
        if let Ok(mut state) = self.state.lock() {
            state.transfer = Some(TransferProgress::new(self.label.clone(), total));
            state.line_open = false;
        }
    }

    fn on_progress(&self, _name: &str, bytes: u64) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let Some(transfer) = state.transfer.as_mut() else {
            return;
        };
        let Some(snapshot) = transfer.advance(bytes) else {
            return;
        };
        let line = snapshot.render(transfer.label());
        let complete = transfer.is_complete();
        self.write(&format!("\r{line}"));
        state.line_open = true;
        if complete {
            self.close_line(&mut state);
            state.transfer = None;
        }
    }

    fn on_file_complete(&self, _name: &str, _stats: &FileStats) {
        if let Ok(mut state) = self.state.lock() {
            self.close_line(&mut state);
            state.transfer = None;
        }
    }

    fn on_error(&self, _name: &str, _error: &str) {
        if let Ok(mut state) = self.state.lock() {
            self.close_line(&mut state);
            state.transfer = None;
        }
    }
}
