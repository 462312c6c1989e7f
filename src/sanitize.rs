//! Turning remote names into safe local path segments.

/// Longest file name (in bytes) most file systems accept.
const MAX_NAME_BYTES: usize = 255;

/// Placeholder used when nothing usable is left of a name.
const FALLBACK_NAME: &str = "_";

/// Characters rejected by at least one of the common file systems.
const INVALID_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Device names Windows refuses regardless of extension.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Signature of a pluggable name sanitizer.
pub type Sanitizer = fn(&str) -> String;

/// Makes `name` usable as a single path segment on any common platform.
///
/// Path separators, characters invalid on Windows and control characters
/// are removed, trailing dots and spaces are trimmed, reserved device names
/// get a `_` suffix and the result is cut to 255 bytes on a character
/// boundary. A name with nothing left becomes `_`, so a sanitized segment
/// never collapses into its parent directory.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !INVALID_CHARS.contains(c))
        .collect();
    let mut cleaned = cleaned.trim_end_matches(['.', ' ']).trim_start().to_string();

    if cleaned.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let stem = cleaned.split('.').next().unwrap_or_default();
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
        let at = stem.len();
        cleaned.insert(at, '_');
    }

    truncate_to_boundary(&mut cleaned, MAX_NAME_BYTES);
    let kept = cleaned.trim_end_matches(['.', ' ']).len();
    if kept == 0 {
        return FALLBACK_NAME.to_string();
    }
    cleaned.truncate(kept);
    cleaned
}

fn truncate_to_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
