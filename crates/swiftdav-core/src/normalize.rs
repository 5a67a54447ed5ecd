//! Uniform metadata model and the conversion from raw backend objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::path::{parent_directory, PathPrefixer};

/// Content type that marks an object as a directory.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/directory";

/// Object attributes as a backend reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawObject {
    /// Backend path, prefix included
    pub name: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl RawObject {
    pub fn is_directory(&self) -> bool {
        self.content_type.as_deref() == Some(DIRECTORY_CONTENT_TYPE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    /// Neither backend exposes per-object ACLs
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAttributes {
    pub path: String,
    pub size: Option<u64>,
    pub mimetype: Option<String>,
    /// Epoch seconds
    pub last_modified: Option<i64>,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryAttributes {
    pub path: String,
}

/// Normalized listing / metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectMetadata {
    File(FileAttributes),
    #[serde(rename = "dir")]
    Directory(DirectoryAttributes),
}

impl ObjectMetadata {
    pub fn path(&self) -> &str {
        match self {
            ObjectMetadata::File(file) => &file.path,
            ObjectMetadata::Directory(dir) => &dir.path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ObjectMetadata::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, ObjectMetadata::Directory(_))
    }

    pub fn as_file(&self) -> Option<&FileAttributes> {
        match self {
            ObjectMetadata::File(file) => Some(file),
            ObjectMetadata::Directory(_) => None,
        }
    }
}

/// Convert a raw backend object into the uniform model.
pub fn normalize(prefixer: &PathPrefixer, raw: &RawObject) -> ObjectMetadata {
    let path = prefixer
        .to_storage_path(&raw.name)
        .trim_matches('/')
        .to_string();

    if raw.is_directory() {
        return ObjectMetadata::Directory(DirectoryAttributes { path });
    }

    let mimetype = match raw.content_type.as_deref() {
        Some(ct) if !ct.is_empty() => Some(ct.to_string()),
        _ => Some(guess_mimetype(&path)),
    };

    ObjectMetadata::File(FileAttributes {
        size: raw.content_length,
        mimetype,
        last_modified: raw.last_modified.map(|ts| ts.timestamp()),
        visibility: Visibility::Unknown,
        path,
    })
}

/// `entry` preceded by the directories its path implies below `base`.
///
/// Each directory is yielded once per `seen` set, and a real directory entry
/// that was already implied by an earlier file is dropped.
pub fn emulate_directories(
    base: &str,
    entry: ObjectMetadata,
    seen: &mut HashSet<String>,
) -> Vec<ObjectMetadata> {
    let mut entries = Vec::new();
    let mut current = parent_directory(entry.path());
    while let Some(dir) = current {
        // Ancestors of a seen directory were seen with it.
        if !is_below(base, dir) || !seen.insert(dir.to_string()) {
            break;
        }
        entries.push(ObjectMetadata::Directory(DirectoryAttributes {
            path: dir.to_string(),
        }));
        current = parent_directory(dir);
    }
    entries.reverse();

    if entry.is_dir() && !seen.insert(entry.path().to_string()) {
        return entries;
    }
    entries.push(entry);
    entries
}

fn is_below(base: &str, dir: &str) -> bool {
    base.is_empty()
        || dir
            .strip_prefix(base)
            .is_some_and(|rest| rest.len() > 1 && rest.starts_with('/'))
}

/// Best-guess content type from the file extension.
pub fn guess_mimetype(path: &str) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
