//! Filesystem adapter over an OpenStack object-store container.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{
    BackendResult, Container, CreateObject, ListObjectsOptions, ObjectContent, ObjectStoreService,
    OpenStackClient,
};
use crate::adapter::{collect_stream, ByteStream, FilesystemAdapter, MetadataStream};
use crate::capability::{self, Capabilities, Operation};
use crate::error::BackendError;
use crate::normalize::{
    emulate_directories, normalize, ObjectMetadata, RawObject, DIRECTORY_CONTENT_TYPE,
};
use crate::options::{ObjectOptions, WriteConfig};
use crate::path::{normalize_path, PathPrefixer};
use crate::{Error, Result};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Adapter storing files as objects of one Swift container.
///
/// Directories are zero-length marker objects with content type
/// `application/directory`. The service and container handles are resolved
/// on first use and kept for the adapter's lifetime.
pub struct OpenStackAdapter {
    client: Arc<dyn OpenStackClient>,
    container_name: String,
    prefixer: PathPrefixer,
    capabilities: Capabilities,
    page_size: usize,
    service: OnceCell<Arc<dyn ObjectStoreService>>,
    container: OnceCell<Arc<dyn Container>>,
}

impl OpenStackAdapter {
    pub fn new(
        client: Arc<dyn OpenStackClient>,
        container_name: impl Into<String>,
        prefix: &str,
    ) -> Self {
        let container_name = container_name.into();
        let prefixer = PathPrefixer::new(prefix);
        info!(
            "Created OpenStack adapter for container: {}, prefix: {:?}",
            container_name,
            prefixer.prefix()
        );
        Self {
            client,
            container_name,
            prefixer,
            capabilities: capability::OPENSTACK,
            page_size: DEFAULT_PAGE_SIZE,
            service: OnceCell::new(),
            container: OnceCell::new(),
        }
    }

    /// Objects requested per listing round trip.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn prefixer(&self) -> &PathPrefixer {
        &self.prefixer
    }

    async fn service(&self) -> BackendResult<Arc<dyn ObjectStoreService>> {
        self.service
            .get_or_try_init(|| async {
                debug!("Resolving object-store service");
                self.client.object_store_v1().await
            })
            .await
            .map(Arc::clone)
    }

    async fn container(&self) -> BackendResult<Arc<dyn Container>> {
        self.container
            .get_or_try_init(|| async {
                let service = self.service().await?;
                debug!("Resolving container: {}", self.container_name);
                service.get_container(&self.container_name).await
            })
            .await
            .map(Arc::clone)
    }

    /// Options for `operation` from the caller's config.
    fn object_options(
        &self,
        operation: Operation,
        config: &WriteConfig,
    ) -> BackendResult<ObjectOptions> {
        let payload = self.capabilities.merge_config(operation, config);
        let mut options = ObjectOptions::from_payload(payload)?;
        if options.content_type.is_none() {
            options.content_type = config
                .get_str("mimetype")
                .filter(|m| !m.is_empty())
                .map(str::to_string);
        }
        Ok(options)
    }

    async fn put_object(
        &self,
        path: &str,
        content: ObjectContent,
        config: &WriteConfig,
    ) -> BackendResult<()> {
        let name = self.prefixer.to_backend_path(path)?;
        let options = self.object_options(Operation::Put, config)?;
        debug!("OpenStack PUT: {}", name);
        self.container()
            .await?
            .create_object(CreateObject {
                name,
                content,
                options,
            })
            .await
    }

    async fn copy_object(
        &self,
        source: &str,
        destination: &str,
        config: &WriteConfig,
    ) -> BackendResult<()> {
        let source_name = self.prefixer.to_backend_path(source)?;
        let name = self.prefixer.to_backend_path(destination)?;
        let container = self.container().await?;
        let object = container.get_object(&source_name).await?;
        let content_type = object.info.content_type.clone();
        let data = collect_stream(object.content).await?;

        let mut options = self.object_options(Operation::Put, config)?;
        if options.content_type.is_none() {
            options.content_type = content_type;
        }
        debug!("OpenStack COPY: {} -> {}", source, name);
        container
            .create_object(CreateObject {
                name,
                content: ObjectContent::Bytes(data),
                options,
            })
            .await
    }

    /// Every object at or below the directory `path`, all pages.
    async fn directory_objects(&self, path: &str) -> BackendResult<Vec<RawObject>> {
        let marker_name = self.prefixer.to_backend_path(path)?;
        let dir_prefix = self.prefixer.to_backend_directory(path)?;
        let container = self.container().await?;
        let objects: Vec<RawObject> = paged_listing(container, marker_name.clone(), self.page_size)
            .try_filter(|raw| {
                let keep = raw.name == marker_name
                    || dir_prefix.is_empty()
                    || raw.name.starts_with(&dir_prefix);
                futures::future::ready(keep)
            })
            .try_collect()
            .await?;
        Ok(objects)
    }
}

/// Lazily page through `list_objects` using the last name as marker.
fn paged_listing(
    container: Arc<dyn Container>,
    prefix: String,
    page_size: usize,
) -> BoxStream<'static, BackendResult<RawObject>> {
    stream::try_unfold(Some(None::<String>), move |state| {
        let container = Arc::clone(&container);
        let prefix = prefix.clone();
        async move {
            let Some(marker) = state else {
                return Ok(None);
            };
            let page = container
                .list_objects(
                    ListObjectsOptions::with_prefix(prefix)
                        .marker(marker)
                        .limit(page_size),
                )
                .await?;
            let next = if page.len() < page_size {
                None
            } else {
                page.last().map(|last| Some(last.name.clone()))
            };
            Ok::<_, BackendError>(Some((stream::iter(page.into_iter().map(Ok)), next)))
        }
    })
    .try_flatten()
    .boxed()
}

#[async_trait]
impl FilesystemAdapter for OpenStackAdapter {
    async fn file_exists(&self, path: &str) -> Result<bool> {
        async {
            let name = self.prefixer.to_backend_path(path)?;
            debug!("OpenStack HEAD: {}", name);
            self.container().await?.object_exists(&name).await
        }
        .await
        .map_err(|source| Error::ExistenceCheckFailed {
            path: path.to_string(),
            source,
        })
    }

    async fn directory_exists(&self, path: &str) -> Result<bool> {
        async {
            let dir_prefix = self.prefixer.to_backend_directory(path)?;
            let marker_name = self.prefixer.to_backend_path(path)?;
            debug!("OpenStack LIST (limit 1): {}", dir_prefix);
            let container = self.container().await?;
            let children = container
                .list_objects(ListObjectsOptions::with_prefix(dir_prefix).limit(1))
                .await?;
            if !children.is_empty() {
                return Ok(true);
            }
            if marker_name.is_empty() {
                return Ok(false);
            }
            // An empty directory only exists through its marker object.
            match container.object_info(&marker_name).await {
                Ok(raw) => Ok(raw.is_directory()),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            }
        }
        .await
        .map_err(|source| Error::ExistenceCheckFailed {
            path: path.to_string(),
            source,
        })
    }

    async fn write(&self, path: &str, contents: Bytes, config: &WriteConfig) -> Result<()> {
        self.put_object(path, ObjectContent::Bytes(contents), config)
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
        self.put_object(path, ObjectContent::Stream(contents), config)
            .await
            .map_err(|source| Error::WriteFailed {
                path: path.to_string(),
                source,
            })
    }

    async fn read_stream(&self, path: &str) -> Result<ByteStream> {
        async {
            let name = self.prefixer.to_backend_path(path)?;
            debug!("OpenStack GET: {}", name);
            let object = self.container().await?.get_object(&name).await?;
            Ok::<_, BackendError>(object.content)
        }
        .await
        .map_err(|source| Error::ReadFailed {
            path: path.to_string(),
            source,
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        async {
            let name = self.prefixer.to_backend_path(path)?;
            debug!("OpenStack DELETE: {}", name);
            self.container().await?.delete_object(&name).await
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
        let objects = self.directory_objects(path).await.map_err(delete_failed)?;
        let container = self.container().await.map_err(delete_failed)?;

        let total = objects.len();
        for (deleted, object) in objects.into_iter().enumerate() {
            debug!("OpenStack DELETE: {}", object.name);
            if let Err(e) = container.delete_object(&object.name).await {
                warn!(
                    "Deleting directory {} stopped at {} after {}/{} objects: {}",
                    path, object.name, deleted, total, e
                );
                return Err(delete_failed(e));
            }
        }
        info!("Deleted directory {} ({} objects)", path, total);
        Ok(())
    }

    async fn create_directory(&self, path: &str, config: &WriteConfig) -> Result<()> {
        async {
            let name = self.prefixer.to_backend_path(path)?;
            debug!("OpenStack PUT (directory marker): {}", name);
            let mut options = self.object_options(Operation::Post, config)?;
            options.content_type = Some(DIRECTORY_CONTENT_TYPE.to_string());
            self.container()
                .await?
                .create_object(CreateObject {
                    name,
                    content: ObjectContent::Bytes(Bytes::new()),
                    options,
                })
                .await
        }
        .await
        .map_err(|source| Error::CreateDirectoryFailed {
            path: path.to_string(),
            source,
        })
    }

    async fn copy(&self, source: &str, destination: &str, config: &WriteConfig) -> Result<()> {
        self.copy_object(source, destination, config)
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
            self.copy_object(source, destination, config).await?;
            let name = self.prefixer.to_backend_path(source)?;
            debug!("OpenStack DELETE (move source): {}", name);
            self.container().await?.delete_object(&name).await
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
        let base = normalize_path(path).map_err(listing_failed)?;
        let dir_prefix = self
            .prefixer
            .to_backend_directory(&base)
            .map_err(listing_failed)?;
        debug!("OpenStack LIST: {} (recursive: {})", dir_prefix, recursive);
        let container = self.container().await.map_err(listing_failed)?;

        let prefixer = self.prefixer.clone();
        let path = path.to_string();
        Ok(paged_listing(container, dir_prefix, self.page_size)
            .map(move |item| {
                item.map(|raw| normalize(&prefixer, &raw))
                    .map_err(|source| Error::ListingFailed {
                        path: path.clone(),
                        source,
                    })
            })
            // Swift has no real directories: a file implies its parents.
            .scan(HashSet::new(), move |seen, item| {
                let entries: Vec<Result<ObjectMetadata>> = match item {
                    Ok(entry) => emulate_directories(&base, entry, seen)
                        .into_iter()
                        .map(Ok)
                        .collect(),
                    Err(e) => vec![Err(e)],
                };
                futures::future::ready(Some(stream::iter(entries)))
            })
            .flatten()
            .boxed())
    }

    async fn metadata(&self, path: &str) -> Result<ObjectMetadata> {
        let raw = async {
            let name = self.prefixer.to_backend_path(path)?;
            debug!("OpenStack HEAD (metadata): {}", name);
            self.container().await?.object_info(&name).await
        }
        .await
        .map_err(|source| Error::MetadataRetrievalFailed {
            path: path.to_string(),
            attribute: "metadata",
            source,
        })?;
        Ok(normalize(&self.prefixer, &raw))
    }
}
