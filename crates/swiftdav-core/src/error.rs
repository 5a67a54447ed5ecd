//! Error types for the swiftdav adapters.
//!
//! Every public adapter operation reports failure through [`Error`], whose
//! variants name the operation that failed. Faults coming from a backend
//! client are carried as a [`BackendError`] source.

use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the adapters.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// `file_exists` or `directory_exists` failed
    #[error("Unable to check existence of {path}: {source}")]
    ExistenceCheckFailed {
        path: String,
        #[source]
        source: BackendError,
    },

    /// `write` or `write_stream` failed
    #[error("Unable to write file at {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: BackendError,
    },

    /// `read` or `read_stream` failed
    #[error("Unable to read file at {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: BackendError,
    },

    /// `delete` or `delete_directory` failed
    #[error("Unable to delete {path}: {source}")]
    DeleteFailed {
        path: String,
        #[source]
        source: BackendError,
    },

    /// `create_directory` failed
    #[error("Unable to create directory at {path}: {source}")]
    CreateDirectoryFailed {
        path: String,
        #[source]
        source: BackendError,
    },

    /// `copy` failed
    #[error("Unable to copy {source_path} to {destination}: {source}")]
    CopyFailed {
        source_path: String,
        destination: String,
        #[source]
        source: BackendError,
    },

    /// `move_file` failed, possibly after the copy succeeded
    #[error("Unable to move {source_path} to {destination}: {source}")]
    MoveFailed {
        source_path: String,
        destination: String,
        #[source]
        source: BackendError,
    },

    /// `list_contents` failed, up front or mid-stream
    #[error("Unable to list contents of {path}: {source}")]
    ListingFailed {
        path: String,
        #[source]
        source: BackendError,
    },

    /// `metadata` or one of its attribute getters failed
    #[error("Unable to retrieve {attribute} for {path}: {source}")]
    MetadataRetrievalFailed {
        path: String,
        attribute: &'static str,
        #[source]
        source: BackendError,
    },

    /// Neither backend has a per-object ACL model to set.
    #[error("Visibility is not supported by this adapter (path: {path})")]
    VisibilityUnsupported { path: String },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    ExistenceCheckFailed,
    WriteFailed,
    ReadFailed,
    DeleteFailed,
    CreateDirectoryFailed,
    CopyFailed,
    MoveFailed,
    ListingFailed,
    MetadataRetrievalFailed,
    VisibilityUnsupported,
}

impl Error {
    /// The operation kind this error was raised for.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::ExistenceCheckFailed { .. } => ErrorKind::ExistenceCheckFailed,
            Error::WriteFailed { .. } => ErrorKind::WriteFailed,
            Error::ReadFailed { .. } => ErrorKind::ReadFailed,
            Error::DeleteFailed { .. } => ErrorKind::DeleteFailed,
            Error::CreateDirectoryFailed { .. } => ErrorKind::CreateDirectoryFailed,
            Error::CopyFailed { .. } => ErrorKind::CopyFailed,
            Error::MoveFailed { .. } => ErrorKind::MoveFailed,
            Error::ListingFailed { .. } => ErrorKind::ListingFailed,
            Error::MetadataRetrievalFailed { .. } => ErrorKind::MetadataRetrievalFailed,
            Error::VisibilityUnsupported { .. } => ErrorKind::VisibilityUnsupported,
        }
    }

    /// The backend fault behind this error, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Error::ExistenceCheckFailed { source, .. }
            | Error::WriteFailed { source, .. }
            | Error::ReadFailed { source, .. }
            | Error::DeleteFailed { source, .. }
            | Error::CreateDirectoryFailed { source, .. }
            | Error::CopyFailed { source, .. }
            | Error::MoveFailed { source, .. }
            | Error::ListingFailed { source, .. }
            | Error::MetadataRetrievalFailed { source, .. } => Some(source),
            Error::Config(_) | Error::VisibilityUnsupported { .. } => None,
        }
    }
}

/// Faults reported by a backend client.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status
    #[error("Backend returned status {status} for {path}")]
    Http { status: u16, path: String },

    /// Transport-level failure (connection, TLS, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request options could not be built, or the path leaves the root
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The object exists but is a directory marker
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// The backend did not report the requested attribute
    #[error("Attribute {attribute} not reported for {path}")]
    MissingAttribute {
        path: String,
        attribute: &'static str,
    },

    /// Object store error
    #[error("Object store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::InvalidResponse(err.to_string())
    }
}

impl From<quick_xml::Error> for BackendError {
    fn from(err: quick_xml::Error) -> Self {
        BackendError::InvalidResponse(format!("Malformed multistatus body: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}
