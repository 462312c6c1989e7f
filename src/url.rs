//! Share-link parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Prefix every Gofile share link starts with.
pub const SHARE_PREFIX: &str = "https://gofile.io/d/";

static SHARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://gofile\.io/d/([A-Za-z0-9_-]+)/?(?:[?#].*)?$").expect("valid regex")
});

/// Extracts the content id from a share link such as
/// `https://gofile.io/d/ABC123`.
///
/// A trailing slash, query string or fragment is ignored. Anything else
/// after the id, or a link on another host, is rejected.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if `url` is not a share link.
pub fn parse_share_url(url: &str) -> Result<String> {
    SHARE_RE
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
        .ok_or_else(|| Error::InvalidUrl(url.to_string()))
}
