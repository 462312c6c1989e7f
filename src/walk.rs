//! Depth-first mirroring of a shared tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::DownloadConfig;
use crate::download::{DownloadOutcome, Downloader};
use crate::error::Result;
use crate::fs::{FileSystem, TokioFileSystem};
use crate::progress::DownloadProgress;
use crate::resolver::{ApiResolver, ChildKind, ContentKind, ContentSource};
use crate::sanitize::{Sanitizer, sanitize_filename};
use crate::session::Session;
use crate::stats::{WalkSummary, WalkSummaryBuilder};
use crate::url::parse_share_url;

/// One unit of pending work.
#[derive(Debug)]
enum Task {
    /// Resolve a content id and mirror it under `base`.
    Resolve {
        base: PathBuf,
        content_id: String,
        depth: usize,
    },
    /// Download a file already listed by its parent folder.
    Fetch {
        base: PathBuf,
        name: String,
        link: String,
    },
}

/// Mirrors a shared tree onto local disk, one request at a time.
pub struct Walker<S: ContentSource = ApiResolver, F: FileSystem = TokioFileSystem> {
    source: S,
    downloader: Downloader<F>,
    sanitize: Sanitizer,
}

impl Walker<ApiResolver, TokioFileSystem> {
    /// Creates a walker that resolves through the HTTP API and writes with `tokio::fs`.
    #[must_use]
    pub fn from_session(session: Arc<Session>, config: DownloadConfig) -> Self {
        Self::new(
            ApiResolver::new(Arc::clone(&session)),
            Downloader::new(session, config),
        )
    }
}

impl<S: ContentSource, F: FileSystem> Walker<S, F> {
    /// Creates a walker from its parts, sanitizing names with [`sanitize_filename`].
    #[must_use]
    pub const fn new(source: S, downloader: Downloader<F>) -> Self {
        Self {
            source,
            downloader,
            sanitize: sanitize_filename,
        }
    }

    /// Replaces the name sanitizer.
    #[must_use]
    pub const fn with_sanitizer(mut self, sanitize: Sanitizer) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Mirrors the tree behind a share link into `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`](crate::Error::InvalidUrl) before any
    /// network traffic if `url` is not a share link, and otherwise the same
    /// errors as [`run`](Self::run).
    pub async fn run_url(
        &self,
        base: &Path,
        url: &str,
        password: Option<&str>,
        progress: &dyn DownloadProgress,
    ) -> Result<WalkSummary> {
        let content_id = parse_share_url(url)?;
        log::info!("Resolving {url} (content {content_id})");
        self.run(base, &content_id, password, progress).await
    }

    /// Mirrors the tree rooted at `content_id` into `base`.
    ///
    /// Branch and file failures are logged and recorded in the returned
    /// summary; the walk carries on with the remaining siblings. The same
    /// password is used at every level.
    ///
    /// # Errors
    ///
    /// Returns only fatal errors, i.e. when a session credential cannot be
    /// obtained.
    pub async fn run(
        &self,
        base: &Path,
        content_id: &str,
        password: Option<&str>,
        progress: &dyn DownloadProgress,
    ) -> Result<WalkSummary> {
        let max_depth = self.downloader.config().max_depth;
        let mut summary = WalkSummaryBuilder::new();
        let mut visited = HashSet::new();
        let mut stack = vec![Task::Resolve {
            base: base.to_path_buf(),
            content_id: content_id.to_string(),
            depth: 0,
        }];

        while let Some(task) = stack.pop() {
            match task {
                Task::Fetch { base, name, link } => {
                    let destination = base.join((self.sanitize)(&name));
                    self.fetch(&destination, &link, progress, &mut summary)
                        .await?;
                }
                Task::Resolve {
                    base,
                    content_id,
                    depth,
                } => {
                    if depth > max_depth {
                        log::warn!(
                            "Folder {content_id} is nested deeper than {max_depth} levels, skipping"
                        );
                        summary.add_branch_failure(content_id, "maximum folder depth exceeded");
                        continue;
                    }
                    if !visited.insert(content_id.clone()) {
                        log::warn!("Folder {content_id} was already visited, skipping cycle");
                        summary.add_branch_failure(content_id, "folder already visited");
                        continue;
                    }

                    let descriptor = match self.source.resolve(&content_id, password).await {
                        Ok(descriptor) => descriptor,
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            log::error!("{e}");
                            summary.add_branch_failure(content_id, e.to_string());
                            continue;
                        }
                    };
                    summary.add_resolved();

                    let target = base.join((self.sanitize)(&descriptor.name));
                    match descriptor.kind {
                        ContentKind::File { link, .. } => {
                            self.fetch(&target, &link, progress, &mut summary).await?;
                        }
                        ContentKind::Folder { children } => {
                            log::debug!(
                                "Folder {} ({content_id}) has {} entries",
                                descriptor.name,
                                children.len()
                            );
                            if let Err(e) = self.downloader.ensure_dir(&target).await {
                                log::error!(
                                    "Cannot create folder {}: {e}",
                                    target.display()
                                );
                                summary.add_branch_failure(content_id, e.to_string());
                                continue;
                            }
                            // Reversed so the first listed child is handled first.
                            stack.extend(children.into_iter().rev().map(|child| {
                                match child.kind {
                                    ChildKind::Folder => Task::Resolve {
                                        base: target.clone(),
                                        content_id: child.id,
                                        depth: depth + 1,
                                    },
                                    ChildKind::File { link, .. } => Task::Fetch {
                                        base: target.clone(),
                                        name: child.name,
                                        link,
                                    },
                                }
                            }));
                        }
                    }
                }
            }
        }

        Ok(summary.build())
    }

    /// Downloads one file, downgrading every non-fatal error to a recorded failure.
    async fn fetch(
        &self,
        destination: &Path,
        link: &str,
        progress: &dyn DownloadProgress,
        summary: &mut WalkSummaryBuilder,
    ) -> Result<()> {
        match self.downloader.download(link, destination, progress).await {
            Ok(DownloadOutcome::Downloaded(stats)) => {
                log::info!("Downloaded: {} ({link})", destination.display());
                summary.add_download(&stats);
            }
            Ok(DownloadOutcome::Skipped) => summary.add_skipped(),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::error!(
                    "Failed to download ({e}): {} ({link})",
                    destination.display()
                );
                summary.add_file_failure(destination.display().to_string(), e.to_string());
            }
        }
        Ok(())
    }
}
