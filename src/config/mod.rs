//! Configuration types for resolution and download operations.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of bytes handed to the writer and progress reporter at once.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Default maximum folder nesting followed before a branch is abandoned.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Configuration for download operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Upper bound on the size of each piece written to disk.
    pub chunk_size: usize,
    /// Maximum folder depth below the shared root.
    pub max_depth: usize,
    /// Whether to remove `.part` files when a download fails.
    pub cleanup_on_error: bool,
    /// Per-request timeout in seconds. `None` leaves the transport default.
    pub request_timeout_secs: Option<u64>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            cleanup_on_error: true,
            request_timeout_secs: None,
            user_agent: format!("gofile-dl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chunk size. Zero is clamped to one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets the maximum folder depth.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets whether to clean up `.part` files on download error.
    #[must_use]
    pub const fn with_cleanup_on_error(mut self, cleanup: bool) -> Self {
        self.cleanup_on_error = cleanup;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.request_timeout_secs = secs;
        self
    }
}

/// Base URLs of the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Base of the JSON API (`/accounts`, `/contents/{id}`).
    pub api_base: String,
    /// Base of the website serving the script bundle.
    pub site_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: "https://api.gofile.io".to_string(),
            site_base: "https://gofile.io".to_string(),
        }
    }
}

impl Endpoints {
    /// Points both the API and the website at the same base URL.
    #[must_use]
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            api_base: base.clone(),
            site_base: base,
        }
    }

    /// `POST` target that hands out account tokens.
    #[must_use]
    pub fn accounts_url(&self) -> String {
        format!("{}/accounts", self.api_base.trim_end_matches('/'))
    }

    /// Metadata URL for a single content id.
    #[must_use]
    pub fn contents_url(&self, content_id: &str) -> String {
        format!("{}/contents/{content_id}", self.api_base.trim_end_matches('/'))
    }

    /// Script bundle carrying the website token.
    #[must_use]
    pub fn script_url(&self) -> String {
        format!("{}/dist/js/alljs.js", self.site_base.trim_end_matches('/'))
    }
}

/// Complete application configuration as read from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory the shared tree is mirrored into.
    pub output_dir: PathBuf,
    /// Download configuration.
    pub download: DownloadConfig,
    /// Remote endpoints.
    pub endpoints: Endpoints,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            download: DownloadConfig::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the default config file location
    /// (`$XDG_CONFIG_HOME/gofile-dl/config.toml` on Linux).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gofile-dl").join("config.toml"))
    }

    /// Loads configuration from `path`, or from [`default_path`](Self::default_path)
    /// when `path` is `None`.
    ///
    /// A missing default file yields the defaults. A missing explicit file is
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}
