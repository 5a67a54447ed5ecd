//! Filesystem adapter over a WebDAV server.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{mkcol, BackendResult, DavResource, Depth, WebDavClient};
use crate::adapter::{collect_stream, ByteStream, FilesystemAdapter, MetadataStream};
use crate::capability::{self, Capabilities, Operation};
use crate::error::BackendError;
use crate::normalize::{normalize, ObjectMetadata, RawObject};
use crate::options::{ObjectOptions, WriteConfig};
use crate::path::{encode_path, normalize_path, parent_directory, PathPrefixer};
use crate::{Error, Result};

/// Adapter storing files as WebDAV resources.
///
/// Directories are collections. Writes create the parent collection chain
/// first, since servers refuse a `PUT` into a missing collection.
pub struct WebDavAdapter {
    client: Arc<dyn WebDavClient>,
    prefixer: PathPrefixer,
    capabilities: Capabilities,
}

impl WebDavAdapter {
    pub fn new(client: Arc<dyn WebDavClient>, prefix: &str) -> Self {
        let prefixer = PathPrefixer::new(prefix);
        info!("Created WebDAV adapter with prefix: {:?}", prefixer.prefix());
        Self {
            client,
            prefixer,
            capabilities: capability::WEBDAV,
        }
    }

    pub fn prefixer(&self) -> &PathPrefixer {
        &self.prefixer
    }

    /// Encoded backend location of a storage path.
    fn location(&self, path: &str) -> BackendResult<String> {
        Ok(encode_path(&self.prefixer.to_backend_path(path)?))
    }

    fn request_headers(
        &self,
        operation: Operation,
        config: &WriteConfig,
    ) -> BackendResult<HeaderMap> {
        let payload = self.capabilities.merge_config(operation, config);
        let options = ObjectOptions::from_payload(payload)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                BackendError::InvalidRequest(format!("Invalid header name {}: {}", name, e))
            })?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| BackendError::InvalidRequest(format!("Invalid header value: {}", e)))?;
            headers.insert(name, value);
        }

        let content_type = match (options.content_type, operation) {
            (Some(ct), _) => Some(ct),
            (None, Operation::Put) => config
                .get_str("mimetype")
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            (None, _) => None,
        };
        if let Some(ct) = content_type {
            let value = HeaderValue::from_str(&ct)
                .map_err(|e| BackendError::InvalidRequest(format!("Invalid content type: {}", e)))?;
            headers.insert(CONTENT_TYPE, value);
        }
        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        location: &str,
        body: Bytes,
        headers: HeaderMap,
    ) -> BackendResult<()> {
        let response = self
            .client
            .request(method, location, body, headers)
            .await?;
        match response.status {
            status if status < 400 => Ok(()),
            404 => Err(BackendError::NotFound(location.to_string())),
            status => Err(BackendError::Http {
                status,
                path: location.to_string(),
            }),
        }
    }

    /// PROPFIND on one resource; `None` when it does not exist.
    async fn resource(&self, location: &str) -> BackendResult<Option<DavResource>> {
        match self.client.prop_find(location, Depth::Zero).await {
            Ok(resources) => Ok(resources.into_iter().next()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// MKCOL every missing collection from the backend root down to `path`.
    async fn make_collections(&self, path: &str, config: &WriteConfig) -> BackendResult<()> {
        let backend_path = self.prefixer.to_backend_path(path)?;
        let mut current = String::new();
        for segment in backend_path.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);

            let location = encode_path(&current);
            match self.resource(&location).await? {
                Some(resource) if resource.is_collection => continue,
                Some(_) => {
                    return Err(BackendError::InvalidRequest(format!(
                        "{} exists and is not a collection",
                        current
                    )))
                }
                None => {}
            }

            debug!("WebDAV MKCOL: {}", location);
            let headers = self.request_headers(Operation::Post, config)?;
            let response = self
                .client
                .request(mkcol(), &location, Bytes::new(), headers)
                .await?;
            // 405: created concurrently by someone else.
            if response.status != 201 && response.status != 405 {
                return Err(BackendError::Http {
                    status: response.status,
                    path: location,
                });
            }
        }
        Ok(())
    }

    async fn put_file(
        &self,
        path: &str,
        contents: Bytes,
        config: &WriteConfig,
    ) -> BackendResult<()> {
        let path = normalize_path(path)?;
        self.make_collections(parent_directory(&path).unwrap_or(""), config)
            .await?;
        let location = self.location(&path)?;
        let headers = self.request_headers(Operation::Put, config)?;
        debug!("WebDAV PUT: {}", location);
        self.send(Method::PUT, &location, contents, headers).await
    }

    async fn get_file(&self, path: &str) -> BackendResult<Bytes> {
        let location = self.location(path)?;
        debug!("WebDAV GET: {}", location);
        let response = self
            .client
            .request(Method::GET, &location, Bytes::new(), HeaderMap::new())
            .await?;
        match response.status {
            200..=299 => Ok(response.body),
            404 => Err(BackendError::NotFound(location)),
            status => Err(BackendError::Http {
                status,
                path: location,
            }),
        }
    }

    async fn copy_file(
        &self,
        source: &str,
        destination: &str,
        config: &WriteConfig,
    ) -> BackendResult<()> {
        let contents = self.get_file(source).await?;
        self.put_file(destination, contents, config).await
    }

    fn normalize(&self, resource: DavResource) -> ObjectMetadata {
        normalize(&self.prefixer, &RawObject::from(resource))
    }
}

#[async_trait]
impl FilesystemAdapter for WebDavAdapter {
    async fn file_exists(&self, path: &str) -> Result<bool> {
        async {
            let location = self.location(path)?;
            debug!("WebDAV PROPFIND (exists): {}", location);
            self.resource(&location).await
        }
        .await
        .map(|found| found.is_some_and(|r| !r.is_collection))
        .map_err(|source| Error::ExistenceCheckFailed {
            path: path.to_string(),
            source,
        })
    }

    async fn directory_exists(&self, path: &str) -> Result<bool> {
        async {
            let location = self.location(path)?;
            debug!("WebDAV PROPFIND (directory exists): {}", location);
            self.resource(&location).await
        }
        .await
        .map(|found| found.is_some_and(|r| r.is_collection))
        .map_err(|source| Error::ExistenceCheckFailed {
            path: path.to_string(),
            source,
        })
    }

    async fn write(&self, path: &str, contents: Bytes, config: &WriteConfig) -> Result<()> {
        self.put_file(path, contents, config)
            .await
            .map_err(|source| Error::WriteFailed {
                path: path.to_string(),
                source,
            })
    }

    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        config: &WriteConfig,
    ) -> Result<()> {
        async {
            let contents = collect_stream(contents).await?;
            self.put_file(path, contents, config).await
        }
        .await
        .map_err(|source| Error::WriteFailed {
            path: path.to_string(),
            source,
        })
    }

    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        let contents = self.get_file(path).await.map_err(|source| Error::ReadFailed {
            path: path.to_string(),
            source,
        })?;
        Ok(stream::once(async move { Ok::<_, BackendError>(contents) }).boxed())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        async {
            let location = self.location(path)?;
            debug!("WebDAV DELETE: {}", location);
            self.send(Method::DELETE, &location, Bytes::new(), HeaderMap::new())
                .await
        }
        .await
        .map_err(|source| Error::DeleteFailed {
            path: path.to_string(),
            source,
        })
    }

    async fn delete_directory(&self, path: &str) -> Result<()> {
        let delete_failed = |source| Error::DeleteFailed {
            path: path.to_string(),
            source,
        };
        let location = self.location(path).map_err(delete_failed)?;
        let members = self
            .client
            .prop_find(&location, Depth::One)
            .await
            .map_err(delete_failed)?;

        let own_path = self
            .prefixer
            .to_backend_path(path)
            .map_err(delete_failed)?;
        let children: Vec<String> = members
            .into_iter()
            .filter(|m| m.path != own_path)
            .map(|m| m.path)
            .collect();
        let total = children.len();

        for (deleted, child) in children.iter().enumerate() {
            let child_location = encode_path(child);
            debug!("WebDAV DELETE: {}", child_location);
            if let Err(e) = self
                .send(Method::DELETE, &child_location, Bytes::new(), HeaderMap::new())
                .await
            {
                warn!(
                    "Deleting directory {} stopped at {} after {}/{} entries: {}",
                    path, child, deleted, total, e
                );
                return Err(delete_failed(e));
            }
        }

        // The backend root itself cannot be removed.
        if !own_path.is_empty() {
            debug!("WebDAV DELETE: {}", location);
            self.send(Method::DELETE, &location, Bytes::new(), HeaderMap::new())
                .await
                .map_err(delete_failed)?;
        }
        info!("Deleted directory {} ({} entries)", path, total);
        Ok(())
    }

    async fn create_directory(&self, path: &str, config: &WriteConfig) -> Result<()> {
        self.make_collections(path, config)
            .await
            .map_err(|source| Error::CreateDirectoryFailed {
                path: path.to_string(),
                source,
            })
    }

    async fn copy(&self, source: &str, destination: &str, config: &WriteConfig) -> Result<()> {
        self.copy_file(source, destination, config)
            .await
            .map_err(|e| Error::CopyFailed {
                source_path: source.to_string(),
                destination: destination.to_string(),
                source: e,
            })
    }

    async fn move_file(
        &self,
        source: &str,
        destination: &str,
        config: &WriteConfig,
    ) -> Result<()> {
        async {
            self.copy_file(source, destination, config).await?;
            let location = self.location(source)?;
            debug!("WebDAV DELETE (move source): {}", location);
            self.send(Method::DELETE, &location, Bytes::new(), HeaderMap::new())
                .await
        }
        .await
        .map_err(|e| Error::MoveFailed {
            source_path: source.to_string(),
            destination: destination.to_string(),
            source: e,
        })
    }

    async fn list_contents(&self, path: &str, recursive: bool) -> Result<MetadataStream> {
        let listing_failed = |source| Error::ListingFailed {
            path: path.to_string(),
            source,
        };
        let own_path = self
            .prefixer
            .to_backend_path(path)
            .map_err(listing_failed)?;
        let location = encode_path(&own_path);
        debug!("WebDAV PROPFIND (list): {} (recursive: {})", location, recursive);
        let members = match self.client.prop_find(&location, Depth::One).await {
            Ok(members) => members,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(source) => return Err(listing_failed(source)),
        };

        let entries: Vec<Result<ObjectMetadata>> = members
            .into_iter()
            .filter(|m| m.path != own_path)
            .map(|m| Ok(self.normalize(m)))
            .collect();
        Ok(stream::iter(entries).boxed())
    }

    async fn metadata(&self, path: &str) -> Result<ObjectMetadata> {
        let resource = async {
            let location = self.location(path)?;
            debug!("WebDAV PROPFIND (metadata): {}", location);
            self.resource(&location)
                .await?
                .ok_or(BackendError::NotFound(location))
        }
        .await
        .map_err(|source| Error::MetadataRetrievalFailed {
            path: path.to_string(),
            attribute: "metadata",
            source,
        })?;
        Ok(self.normalize(resource))
    }
}
