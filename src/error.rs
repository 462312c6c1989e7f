//! Error types for the gofile-dl library.

use thiserror::Error;

use crate::resolver::PasswordStatus;

/// Errors that can occur while resolving or downloading content.
#[derive(Error, Debug)]
pub enum Error {
    /// A session credential could not be obtained. Aborts the whole run.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The top-level URL is not a Gofile share link.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The contents endpoint answered with a non-`ok` status.
    #[error("API error for content {id}: status {status}")]
    Api {
        /// Content id that was queried.
        id: String,
        /// Status string reported by the service.
        status: String,
    },

    /// The content is password protected and the password was missing or wrong.
    #[error("Invalid password for content {id}: {status}")]
    Password {
        /// Content id that was queried.
        id: String,
        /// Password status reported by the service.
        status: PasswordStatus,
    },

    /// The service answered with a body we could not make sense of.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Returns `true` if the error must abort the entire run rather than a
    /// single branch or file.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// A specialized `Result` type for gofile-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
