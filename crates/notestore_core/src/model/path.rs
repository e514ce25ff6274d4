//! Note path normalization and folder-prefix arithmetic.
//!
//! # Responsibility
//! - Turn caller-supplied path strings into one canonical spelling.
//! - Decide folder membership and rewrite paths under a moved folder.
//!
//! # Invariants
//! - Normalized paths start with `/`, never end with `/` (except root), and
//!   never contain empty, `.` or `..` segments.
//! - Paths are case-sensitive; no case folding happens here.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Root folder path.
pub const ROOT: &str = "/";

static SLASH_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/{2,}").expect("valid slash regex"));

/// Rejected path input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    /// Raw input as supplied by the caller.
    pub path: String,
    /// Human-readable rejection reason.
    pub reason: &'static str,
}

impl PathError {
    fn new(path: &str, reason: &'static str) -> Self {
        Self {
            path: path.to_string(),
            reason,
        }
    }
}

impl Display for PathError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid path `{}`: {}", self.path, self.reason)
    }
}

impl Error for PathError {}

/// Normalizes a note path. The bare root is not a valid note path.
pub fn normalize_note_path(raw: &str) -> Result<String, PathError> {
    let normalized = normalize(raw)?;
    if normalized == ROOT {
        return Err(PathError::new(raw, "root is a folder, not a note"));
    }
    Ok(normalized)
}

/// Normalizes a folder path. Accepts the root folder.
pub fn normalize_folder_path(raw: &str) -> Result<String, PathError> {
    normalize(raw)
}

fn normalize(raw: &str) -> Result<String, PathError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathError::new(raw, "path must not be empty"));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(PathError::new(raw, "path must not contain control characters"));
    }

    let slashed = trimmed.replace('\\', "/");
    let collapsed = SLASH_RUN_RE.replace_all(&slashed, "/");
    let mut path = if collapsed.starts_with('/') {
        collapsed.into_owned()
    } else {
        format!("/{collapsed}")
    };
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    if path
        .split('/')
        .skip(1)
        .any(|segment| segment == "." || segment == "..")
    {
        return Err(PathError::new(raw, "relative segments are not allowed"));
    }
    Ok(path)
}

/// Returns whether `path` is `folder` itself or nested beneath it.
///
/// Both inputs must already be normalized.
pub fn is_in_folder(path: &str, folder: &str) -> bool {
    if folder == ROOT {
        return true;
    }
    match path.strip_prefix(folder) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Rewrites `path` from under `old_folder` to under `new_folder`.
///
/// Callers must check `is_in_folder(path, old_folder)` first.
pub fn rebase(path: &str, old_folder: &str, new_folder: &str) -> Result<String, PathError> {
    if old_folder == ROOT {
        return Err(PathError::new(old_folder, "the root folder cannot be moved"));
    }
    let suffix = &path[old_folder.len()..];
    if new_folder == ROOT {
        if suffix.is_empty() {
            return Err(PathError::new(path, "note would be moved onto the root folder"));
        }
        return Ok(suffix.to_string());
    }
    Ok(format!("{new_folder}{suffix}"))
}
