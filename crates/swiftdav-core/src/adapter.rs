//! The uniform filesystem operation set.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

use crate::config::AdapterConfig;
use crate::error::BackendError;
use crate::normalize::{ObjectMetadata, Visibility};
use crate::openstack::{MemoryObjectStore, OpenStackAdapter, SwiftClient, SwiftConfig};
use crate::options::WriteConfig;
use crate::webdav::{HttpDavClient, HttpDavConfig, WebDavAdapter};
use crate::{Error, Result};

/// Object content as a stream of chunks.
pub type ByteStream = BoxStream<'static, std::result::Result<Bytes, BackendError>>;

/// Lazily produced listing entries.
pub type MetadataStream = BoxStream<'static, Result<ObjectMetadata>>;

/// Filesystem operations over a storage backend.
///
/// Paths are relative to the adapter's configured prefix and use `/` as the
/// separator. Each operation reports failure with the [`Error`] variant
/// named after it; the backend fault is kept as the error source.
#[async_trait]
pub trait FilesystemAdapter: Send + Sync {
    /// Whether a file exists at `path`.
    async fn file_exists(&self, path: &str) -> Result<bool>;

    /// Whether `path` is a directory, explicit or implied by its children.
    async fn directory_exists(&self, path: &str) -> Result<bool>;

    /// Create or replace the file at `path`.
    async fn write(&self, path: &str, contents: Bytes, config: &WriteConfig) -> Result<()>;

    /// Create or replace the file at `path` from a chunk stream.
    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        config: &WriteConfig,
    ) -> Result<()>;

    /// Content stream positioned at offset 0.
    async fn read_stream(&self, path: &str) -> Result<ByteStream>;

    /// Whole content, via [`FilesystemAdapter::read_stream`].
    async fn read(&self, path: &str) -> Result<Bytes> {
        let stream = self.read_stream(path).await?;
        collect_stream(stream).await.map_err(|source| Error::ReadFailed {
            path: path.to_string(),
            source,
        })
    }

    /// Delete one file.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Delete everything under `path`, one object at a time.
    ///
    /// Stops at the first failing deletion. Objects deleted before the
    /// failure stay deleted.
    async fn delete_directory(&self, path: &str) -> Result<()>;

    /// Create the directory at `path`.
    async fn create_directory(&self, path: &str, config: &WriteConfig) -> Result<()>;

    /// Copy a file, keeping the source.
    async fn copy(&self, source: &str, destination: &str, config: &WriteConfig) -> Result<()>;

    /// Copy then delete the source. Not atomic.
    async fn move_file(&self, source: &str, destination: &str, config: &WriteConfig)
        -> Result<()>;

    /// Entries below the directory `path`.
    ///
    /// `recursive` is accepted for interface compatibility; listings are
    /// always prefix-flat. Directories implied by nested names are listed
    /// too, each once.
    async fn list_contents(&self, path: &str, recursive: bool) -> Result<MetadataStream>;

    /// Normalized metadata of a file or directory.
    async fn metadata(&self, path: &str) -> Result<ObjectMetadata>;

    /// Size in bytes.
    async fn file_size(&self, path: &str) -> Result<u64> {
        let meta = self.metadata(path).await?;
        let file = expect_file(path, "file size", &meta)?;
        file.size.ok_or_else(|| missing(path, "file size"))
    }

    /// Stored content type, or a guess from the extension.
    async fn mime_type(&self, path: &str) -> Result<String> {
        let meta = self.metadata(path).await?;
        let file = expect_file(path, "mime type", &meta)?;
        file.mimetype.clone().ok_or_else(|| missing(path, "mime type"))
    }

    /// Epoch seconds.
    async fn last_modified(&self, path: &str) -> Result<i64> {
        let meta = self.metadata(path).await?;
        let file = expect_file(path, "last modified", &meta)?;
        file.last_modified.ok_or_else(|| missing(path, "last modified"))
    }

    /// Always [`Visibility::Unknown`] for files.
    async fn visibility(&self, path: &str) -> Result<Visibility> {
        let meta = self.metadata(path).await?;
        let file = expect_file(path, "visibility", &meta)?;
        Ok(file.visibility)
    }

    /// Always fails: no backend here has a settable per-object ACL.
    async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<()> {
        debug!("Rejecting visibility {:?} for {}", visibility, path);
        Err(Error::VisibilityUnsupported {
            path: path.to_string(),
        })
    }
}

fn expect_file<'a>(
    path: &str,
    attribute: &'static str,
    meta: &'a ObjectMetadata,
) -> Result<&'a crate::normalize::FileAttributes> {
    meta.as_file()
        .ok_or_else(|| Error::MetadataRetrievalFailed {
            path: path.to_string(),
            attribute,
            source: BackendError::NotAFile(path.to_string()),
        })
}

fn missing(path: &str, attribute: &'static str) -> Error {
    Error::MetadataRetrievalFailed {
        path: path.to_string(),
        attribute,
        source: BackendError::MissingAttribute {
            path: path.to_string(),
            attribute,
        },
    }
}

/// Drain a content stream into one buffer.
pub async fn collect_stream(mut stream: ByteStream) -> std::result::Result<Bytes, BackendError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

/// Create an adapter from configuration.
///
/// # Example
///
/// ```rust,ignore
/// use swiftdav_core::{create_adapter, AdapterConfig};
///
/// let config = AdapterConfig::from_url("memory://assets")?;
/// let adapter = create_adapter(&config)?;
/// ```
pub fn create_adapter(config: &AdapterConfig) -> Result<Arc<dyn FilesystemAdapter>> {
    match config {
        AdapterConfig::OpenStack {
            storage_url,
            auth_token,
            container,
            prefix,
            page_size,
        } => {
            let client = SwiftClient::new(SwiftConfig {
                storage_url: storage_url.clone(),
                auth_token: auth_token.clone(),
            })?;
            let mut adapter = OpenStackAdapter::new(
                Arc::new(client),
                container.clone(),
                prefix.as_deref().unwrap_or_default(),
            );
            if let Some(page_size) = page_size {
                adapter = adapter.with_page_size(*page_size);
            }
            Ok(Arc::new(adapter))
        }

        AdapterConfig::WebDav {
            base_url,
            username,
            password,
            prefix,
        } => {
            let client = HttpDavClient::new(HttpDavConfig {
                base_url: base_url.clone(),
                username: username.clone(),
                password: password.clone(),
            })?;
            Ok(Arc::new(WebDavAdapter::new(
                Arc::new(client),
                prefix.as_deref().unwrap_or_default(),
            )))
        }

        AdapterConfig::Memory { container, prefix } => Ok(Arc::new(OpenStackAdapter::new(
            Arc::new(MemoryObjectStore::new()),
            container.clone(),
            prefix.as_deref().unwrap_or_default(),
        ))),
    }
}
