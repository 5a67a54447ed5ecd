//! Mapping between caller-visible paths and backend-rooted paths.

use crate::error::BackendError;

/// Prepends and strips the configured root prefix.
///
/// The prefix is stored without a leading separator and, when non-empty,
/// with exactly one trailing separator, so `"/base"`, `"base/"` and `"base"`
/// all scope operations to the `base/` subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathPrefixer {
    prefix: String,
}

impl PathPrefixer {
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        };
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Backend path for a storage path.
    ///
    /// The path is normalized first, so it can never leave the prefix. The
    /// root maps to the prefix without its trailing separator.
    pub fn to_backend_path(&self, path: &str) -> Result<String, BackendError> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Ok(self.prefix.trim_end_matches('/').to_string());
        }
        Ok(format!("{}{}", self.prefix, path))
    }

    /// Backend path for a storage path treated as a directory: ends in `/`
    /// unless it resolves to the backend root.
    pub fn to_backend_directory(&self, path: &str) -> Result<String, BackendError> {
        let location = self.to_backend_path(path)?;
        if location.is_empty() || location.ends_with('/') {
            Ok(location)
        } else {
            Ok(format!("{}/", location))
        }
    }

    /// Storage path for a backend path.
    ///
    /// Removes the prefix only when `path` actually starts with it; any other
    /// input is returned unchanged.
    pub fn to_storage_path(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.prefix.is_empty() {
            return path.to_string();
        }
        match path.strip_prefix(&self.prefix) {
            Some(rest) => rest.to_string(),
            // The prefix directory itself, e.g. a "base" marker object.
            None if path == self.prefix.trim_end_matches('/') => String::new(),
            None => path.to_string(),
        }
    }
}

/// Resolve `.` and `..` segments and drop empty ones.
///
/// Backslashes count as separators. A `..` that climbs above the root and
/// any control character are rejected.
pub fn normalize_path(path: &str) -> Result<String, BackendError> {
    if path.chars().any(char::is_control) {
        return Err(BackendError::InvalidRequest(format!(
            "Corrupted path detected: {:?}",
            path
        )));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(BackendError::InvalidRequest(format!(
                        "Path traversal detected: {}",
                        path
                    )));
                }
            }
            segment => segments.push(segment),
        }
    }
    Ok(segments.join("/"))
}

/// Whether any `/`-separated segment of `path` is `.` or `..`.
pub fn contains_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "." || segment == "..")
}

/// Percent-encode every segment of `path`, keeping the `/` separators.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parent directory of a storage path, `None` at the root.
pub fn parent_directory(path: &str) -> Option<&str> {
    let path = path.trim_matches('/');
    match path.rfind('/') {
        Some(idx) if idx > 0 => Some(&path[..idx]),
        _ => None,
    }
}
