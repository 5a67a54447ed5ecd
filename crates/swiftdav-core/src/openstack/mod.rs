//! OpenStack Swift object storage.
//!
//! The adapter talks to the object store through three small traits that
//! follow the shape of an OpenStack SDK: a client hands out the object-store
//! service, the service hands out containers, and containers do the work.
//!
//! - [`SwiftClient`]: HTTP client for a real Swift endpoint
//! - [`MemoryObjectStore`]: in-process store (for testing)

mod adapter;
mod memory;
mod swift;

pub use adapter::OpenStackAdapter;
pub use memory::MemoryObjectStore;
pub use swift::{SwiftClient, SwiftConfig};

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::adapter::ByteStream;
use crate::error::BackendError;
use crate::normalize::RawObject;
use crate::options::ObjectOptions;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Entry point of an OpenStack connection.
#[async_trait]
pub trait OpenStackClient: Send + Sync {
    /// Object Storage v1 service.
    async fn object_store_v1(&self) -> BackendResult<Arc<dyn ObjectStoreService>>;
}

#[async_trait]
pub trait ObjectStoreService: Send + Sync {
    async fn get_container(&self, name: &str) -> BackendResult<Arc<dyn Container>>;
}

/// Operations on the objects of one container.
#[async_trait]
pub trait Container: Send + Sync {
    fn name(&self) -> &str;

    async fn object_exists(&self, name: &str) -> BackendResult<bool>;

    async fn create_object(&self, object: CreateObject) -> BackendResult<()>;

    /// Object attributes and content.
    async fn get_object(&self, name: &str) -> BackendResult<StorageObject>;

    /// Object attributes only.
    async fn object_info(&self, name: &str) -> BackendResult<RawObject>;

    /// Objects in name order.
    async fn list_objects(&self, options: ListObjectsOptions) -> BackendResult<Vec<RawObject>>;

    async fn delete_object(&self, name: &str) -> BackendResult<()>;
}

pub enum ObjectContent {
    Bytes(Bytes),
    Stream(ByteStream),
}

/// Upload request for [`Container::create_object`].
pub struct CreateObject {
    pub name: String,
    pub content: ObjectContent,
    pub options: ObjectOptions,
}

pub struct StorageObject {
    pub info: RawObject,
    pub content: ByteStream,
}

/// Filters for [`Container::list_objects`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsOptions {
    /// Only names starting with this string
    pub prefix: Option<String>,
    /// Only names sorting after this one
    pub marker: Option<String>,
    pub limit: Option<usize>,
}

impl ListObjectsOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn marker(mut self, marker: Option<String>) -> Self {
        self.marker = marker;
        self
    }
}
