//! Per-file and per-walk statistics.

use std::time::{Duration, Instant};

/// Statistics for a single completed file download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    /// Bytes written to disk.
    pub size: u64,
    /// Time taken to download the file.
    pub elapsed: Duration,
    /// Average download speed in bytes per second.
    pub average_speed: u64,
}

impl FileStats {
    /// Builds stats for `size` bytes transferred over `elapsed`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn new(size: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let average_speed = if secs > 0.0 {
            (size as f64 / secs) as u64
        } else {
            0
        };
        Self {
            size,
            elapsed,
            average_speed,
        }
    }
}

/// Something that could not be resolved or downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    /// Local path (for files) or content id (for folders).
    pub target: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Aggregate outcome of one top-level walk.
#[derive(Debug, Clone, Default)]
pub struct WalkSummary {
    /// Files fetched over the network.
    pub files_downloaded: usize,
    /// Files already present locally and left alone.
    pub files_skipped: usize,
    /// Files whose download failed.
    pub files_failed: usize,
    /// Content ids successfully resolved through the API.
    pub contents_resolved: usize,
    /// Branches abandoned because resolution failed or a guard tripped.
    pub branches_failed: usize,
    /// Bytes written across all downloaded files.
    pub bytes_downloaded: u64,
    /// Wall time of the walk.
    pub elapsed: Duration,
    /// Every failed file or branch, in the order encountered.
    pub failures: Vec<FailedItem>,
}

impl WalkSummary {
    /// Returns `true` if nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the average download speed in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.bytes_downloaded as f64 / secs) as u64
        } else {
            0
        }
    }
}

/// Accumulates a [`WalkSummary`] while the walk runs.
#[derive(Debug)]
pub struct WalkSummaryBuilder {
    summary: WalkSummary,
    start_time: Instant,
}

impl Default for WalkSummaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WalkSummaryBuilder {
    /// Starts a new summary; elapsed time is measured from here.
    #[must_use]
    pub fn new() -> Self {
        Self {
            summary: WalkSummary::default(),
            start_time: Instant::now(),
        }
    }

    /// Records a completed file download.
    pub fn add_download(&mut self, stats: &FileStats) {
        self.summary.files_downloaded += 1;
        self.summary.bytes_downloaded += stats.size;
    }

    /// Records a file left alone because it already exists.
    pub const fn add_skipped(&mut self) {
        self.summary.files_skipped += 1;
    }

    /// Records a successfully resolved content id.
    pub const fn add_resolved(&mut self) {
        self.summary.contents_resolved += 1;
    }

    /// Records a failed file download.
    pub fn add_file_failure(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.summary.files_failed += 1;
        self.summary.failures.push(FailedItem {
            target: path.into(),
            reason: reason.into(),
        });
    }

    /// Records an abandoned branch.
    pub fn add_branch_failure(&mut self, content_id: impl Into<String>, reason: impl Into<String>) {
        self.summary.branches_failed += 1;
        self.summary.failures.push(FailedItem {
            target: content_id.into(),
            reason: reason.into(),
        });
    }

    /// Builds the final summary.
    #[must_use]
    pub fn build(mut self) -> WalkSummary {
        self.summary.elapsed = self.start_time.elapsed();
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stats_speed() {
        let stats = FileStats::new(1000, Duration::from_secs(2));
        assert_eq!(stats.average_speed, 500);
        assert_eq!(FileStats::new(1000, Duration::ZERO).average_speed, 0);
    }

    #[test]
    fn summary_average_speed_zero_elapsed() {
        let summary = WalkSummary {
            bytes_downloaded: 1000,
            ..WalkSummary::default()
        };
        assert_eq!(summary.average_speed(), 0);
    }

    #[test]
    fn builder_counts_everything() {
        let mut builder = WalkSummaryBuilder::new();
        builder.add_resolved();
        builder.add_resolved();
        builder.add_download(&FileStats::new(500, Duration::from_secs(1)));
        builder.add_download(&FileStats::new(250, Duration::from_secs(1)));
        builder.add_skipped();
        builder.add_file_failure("out/a.bin", "HTTP error: 404");
        builder.add_branch_failure("XYZ", "Invalid password");

        let summary = builder.build();
        assert_eq!(summary.contents_resolved, 2);
        assert_eq!(summary.files_downloaded, 2);
        assert_eq!(summary.bytes_downloaded, 750);
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.branches_failed, 1);
        assert!(!summary.is_success());
        assert_eq!(summary.failures[0].target, "out/a.bin");
        assert_eq!(summary.failures[1].target, "XYZ");
    }

    #[test]
    fn empty_summary_is_success() {
        assert!(WalkSummaryBuilder::new().build().is_success());
    }
}
