//! WebDAV servers.
//!
//! - [`HttpDavClient`]: HTTP client for a real server
//! - [`MemoryDavClient`]: in-process server (for testing)

mod adapter;
mod http;
mod memory;

pub use adapter::WebDavAdapter;
pub use http::{parse_multistatus, HttpDavClient, HttpDavConfig};
pub use memory::MemoryDavClient;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::Method;

use crate::error::BackendError;
use crate::normalize::{RawObject, DIRECTORY_CONTENT_TYPE};

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Response to a raw WebDAV request.
#[derive(Debug, Clone)]
pub struct DavResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl DavResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// PROPFIND `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }
}

/// One `<d:response>` of a multistatus body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavResource {
    /// Decoded path relative to the client's base URL, without leading or
    /// trailing `/`
    pub path: String,
    pub is_collection: bool,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<DavResource> for RawObject {
    /// Collections become directory markers.
    fn from(resource: DavResource) -> Self {
        let content_type = if resource.is_collection {
            Some(DIRECTORY_CONTENT_TYPE.to_string())
        } else {
            resource.content_type
        };
        RawObject {
            name: resource.path,
            content_type,
            content_length: resource.content_length,
            last_modified: resource.last_modified,
        }
    }
}

/// Minimal WebDAV client surface the adapter needs.
///
/// Paths are relative to the client's base URL and already percent-encoded.
#[async_trait]
pub trait WebDavClient: Send + Sync {
    /// Issue `method` against `path`. Any HTTP status is a successful
    /// return; only transport faults are errors.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        headers: HeaderMap,
    ) -> BackendResult<DavResponse>;

    /// PROPFIND for resource type, content type, length and modification
    /// time. A missing resource is [`BackendError::NotFound`].
    async fn prop_find(&self, path: &str, depth: Depth) -> BackendResult<Vec<DavResource>>;
}

pub(crate) fn mkcol() -> Method {
    Method::from_bytes(b"MKCOL").expect("MKCOL is a valid method token")
}

pub(crate) fn propfind() -> Method {
    Method::from_bytes(b"PROPFIND").expect("PROPFIND is a valid method token")
}
