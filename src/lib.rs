//! gofile-dl - A library for mirroring Gofile shared links to local disk.
//!
//! This library resolves a share link into its folder tree and downloads
//! every file beneath it, abstracted from any specific UI or display
//! framework.
//!
//! A link that is not a `https://gofile.io/d/<id>` share link is rejected
//! with [`Error::InvalidUrl`] before any request is made. The `gofile-dl`
//! binary exits with status 1 in that case, while a walk that completes
//! with some failed files or folders still exits with 0.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use gofile_dl::{AppConfig, NoProgress, Session, Walker};
//!
//! # async fn example() -> gofile_dl::Result<()> {
//! let config = AppConfig::default();
//! let session = Arc::new(Session::new(&config.download, config.endpoints.clone())?);
//! let walker = Walker::from_session(session, config.download.clone());
//!
//! let summary = walker
//!     .run_url(Path::new("./output"), "https://gofile.io/d/ABC123", None, &NoProgress)
//!     .await?;
//! println!("Downloaded {} files", summary.files_downloaded);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod fs;
pub mod progress;
pub mod resolver;
pub mod sanitize;
pub mod session;
pub mod stats;
pub mod url;
pub mod walk;

// Re-export main types for convenience
pub use config::{AppConfig, DownloadConfig, Endpoints};
pub use download::{DownloadOutcome, Downloader};
pub use error::{Error, Result};
pub use fs::{FileSystem, TokioFileSystem};
pub use progress::{DownloadProgress, LineProgress, NoProgress, TransferProgress};
pub use resolver::{
    ApiResolver, Child, ChildKind, ContentDescriptor, ContentKind, ContentSource, PasswordStatus,
};
pub use sanitize::{Sanitizer, sanitize_filename};
pub use session::Session;
pub use stats::{FailedItem, FileStats, WalkSummary};
pub use url::parse_share_url;
pub use walk::Walker;
