//! Streaming file downloads.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::config::DownloadConfig;
use crate::error::Result;
use crate::fs::{FileSystem, TokioFileSystem};
use crate::progress::DownloadProgress;
use crate::session::Session;
use crate::stats::FileStats;

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was fetched and written.
    Downloaded(FileStats),
    /// The destination already existed; nothing was fetched.
    Skipped,
}

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Streams direct links to local files.
pub struct Downloader<F: FileSystem = TokioFileSystem> {
    session: Arc<Session>,
    config: DownloadConfig,
    fs: F,
}

impl Downloader<TokioFileSystem> {
    /// Creates a new downloader with the default file system.
    #[must_use]
    pub const fn new(session: Arc<Session>, config: DownloadConfig) -> Self {
        Self {
            session,
            config,
            fs: TokioFileSystem,
        }
    }
}

impl<F: FileSystem> Downloader<F> {
    /// Creates a new downloader with a custom file system implementation.
    #[must_use]
    pub const fn with_fs(session: Arc<Session>, config: DownloadConfig, fs: F) -> Self {
        Self {
            session,
            config,
            fs,
        }
    }

    /// Returns the download configuration.
    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Creates `dir` and its parents unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if !dir.as_os_str().is_empty() && !self.fs.file_exists(dir).await {
            self.fs.create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Ensures the parent directory exists for a file path.
    async fn ensure_parent_dir(&self, path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) => self.ensure_dir(parent).await,
            None => Ok(()),
        }
    }

    /// Downloads `link` to `destination` unless something already exists there.
    ///
    /// Bytes go to `{destination}.part` first and are renamed into place once
    /// the body has been fully written.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the
    /// account token cannot be obtained, the server answers with an error
    /// status, or writing fails.
    pub async fn download(
        &self,
        link: &str,
        destination: &Path,
        progress: &dyn DownloadProgress,
    ) -> Result<DownloadOutcome> {
        let name = destination.display().to_string();
        self.ensure_parent_dir(destination).await?;

        if self.fs.file_exists(destination).await {
            log::debug!("Already present, skipping: {name}");
            progress.on_skipped(&name);
            return Ok(DownloadOutcome::Skipped);
        }

        let pp = part_path(destination);
        let result = match self.stream_to(link, &pp, &name, progress).await {
            Ok(stats) => self
                .fs
                .rename_file(&pp, destination)
                .await
                .map(|()| stats)
                .map_err(Into::into),
            Err(e) => Err(e),
        };

        match result {
            Ok(stats) => {
                progress.on_file_complete(&name, &stats);
                Ok(DownloadOutcome::Downloaded(stats))
            }
            Err(e) => {
                if self.config.cleanup_on_error
                    && let Err(cleanup) = self.fs.remove_file(&pp).await
                {
                    log::debug!("Could not remove {}: {cleanup}", pp.display());
                }
                progress.on_error(&name, &e.to_string());
                Err(e)
            }
        }
    }

    async fn stream_to(
        &self,
        link: &str,
        part: &Path,
        name: &str,
        progress: &dyn DownloadProgress,
    ) -> Result<FileStats> {
        let token = self.session.api_token().await?;
        let response = self
            .session
            .http()
            .get(link)
            .header(reqwest::header::COOKIE, format!("accountToken={token}"))
            .send()
            .await?
            .error_for_status()?;

        let total = response.content_length();
        let started = Instant::now();
        progress.on_file_start(name, total);

        let mut file = self.fs.create_file(part).await?;
        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(bytes) = body.next().await {
            let bytes = bytes?;
            for piece in bytes.chunks(self.config.chunk_size.max(1)) {
                file.write_all(piece).await?;
                let len = piece.len() as u64;
                written += len;
                progress.on_progress(name, len);
            }
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(FileStats::new(written, started.elapsed()))
    }
}
