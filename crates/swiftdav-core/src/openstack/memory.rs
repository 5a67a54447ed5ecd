//! In-memory object store for testing.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, GetOptions, GetResult, ObjectStore, PutOptions,
    PutPayload,
};
use std::sync::Arc;
use tracing::debug;

use super::{
    BackendResult, Container, CreateObject, ListObjectsOptions, ObjectContent, ObjectStoreService,
    OpenStackClient, StorageObject,
};
use crate::adapter::collect_stream;
use crate::error::BackendError;
use crate::normalize::{guess_mimetype, RawObject};

/// In-process stand-in for a Swift endpoint, backed by object_store.
///
/// Containers are top-level path segments of one shared [`InMemory`] store,
/// and the object content type is kept as an object attribute. Data does not
/// persist between runs.
#[derive(Clone)]
pub struct MemoryObjectStore {
    store: Arc<InMemory>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
        }
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OpenStackClient for MemoryObjectStore {
    async fn object_store_v1(&self) -> BackendResult<Arc<dyn ObjectStoreService>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ObjectStoreService for MemoryObjectStore {
    async fn get_container(&self, name: &str) -> BackendResult<Arc<dyn Container>> {
        Ok(Arc::new(MemoryContainer {
            store: Arc::clone(&self.store),
            name: name.to_string(),
        }))
    }
}

struct MemoryContainer {
    store: Arc<InMemory>,
    name: String,
}

fn store_error(name: &str, err: object_store::Error) -> BackendError {
    match err {
        object_store::Error::NotFound { .. } => BackendError::NotFound(name.to_string()),
        e => BackendError::Store(e.to_string()),
    }
}

fn attribute(attributes: &Attributes, key: &Attribute) -> Option<String> {
    attributes.get(key).map(|value| {
        let value: &str = value.as_ref();
        value.to_string()
    })
}

impl MemoryContainer {
    fn path(&self, name: &str) -> Path {
        Path::from(format!("{}/{}", self.name, name))
    }

    /// Object name of a store location. `Path` percent-encodes non-ASCII
    /// and reserved characters, so undo that.
    fn object_name(&self, location: &Path) -> String {
        let location = location.as_ref();
        let name = location
            .strip_prefix(&format!("{}/", self.name))
            .unwrap_or(location);
        urlencoding::decode(name)
            .map(|n| n.into_owned())
            .unwrap_or_else(|_| name.to_string())
    }

    fn raw_object(&self, name: &str, result: &GetResult) -> RawObject {
        RawObject {
            name: name.to_string(),
            content_type: attribute(&result.attributes, &Attribute::ContentType),
            content_length: Some(result.meta.size as u64),
            last_modified: Some(result.meta.last_modified),
        }
    }

    async fn head_with_attributes(&self, name: &str) -> BackendResult<GetResult> {
        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        self.store
            .get_opts(&self.path(name), options)
            .await
            .map_err(|e| store_error(name, e))
    }
}

#[async_trait]
impl Container for MemoryContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn object_exists(&self, name: &str) -> BackendResult<bool> {
        match self.store.head(&self.path(name)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(store_error(name, e)),
        }
    }

    async fn create_object(&self, object: CreateObject) -> BackendResult<()> {
        let data = match object.content {
            ObjectContent::Bytes(data) => data,
            ObjectContent::Stream(stream) => collect_stream(stream).await?,
        };

        let options = object.options;
        let content_type = match options.content_type {
            Some(ct) => Some(ct),
            None if options.detect_content_type == Some(true) => Some(guess_mimetype(&object.name)),
            None => None,
        };

        let mut attributes = Attributes::new();
        if let Some(ct) = content_type {
            attributes.insert(Attribute::ContentType, AttributeValue::from(ct));
        }
        if let Some(encoding) = options.content_encoding {
            attributes.insert(Attribute::ContentEncoding, AttributeValue::from(encoding));
        }
        if let Some(disposition) = options.content_disposition {
            attributes.insert(Attribute::ContentDisposition, AttributeValue::from(disposition));
        }
        for (key, value) in options.metadata {
            attributes.insert(Attribute::Metadata(key.into()), AttributeValue::from(value));
        }
        if options.delete_after.is_some() || options.delete_at.is_some() {
            debug!("Memory store ignores expiry for {}", object.name);
        }

        let put_options = PutOptions {
            attributes,
            ..Default::default()
        };
        self.store
            .put_opts(&self.path(&object.name), PutPayload::from_bytes(data), put_options)
            .await
            .map_err(|e| store_error(&object.name, e))?;
        Ok(())
    }

    async fn get_object(&self, name: &str) -> BackendResult<StorageObject> {
        let result = self
            .store
            .get(&self.path(name))
            .await
            .map_err(|e| store_error(name, e))?;
        let info = self.raw_object(name, &result);
        let owned_name = name.to_string();
        let content = result
            .into_stream()
            .map_err(move |e| store_error(&owned_name, e))
            .boxed();
        Ok(StorageObject { info, content })
    }

    async fn object_info(&self, name: &str) -> BackendResult<RawObject> {
        let result = self.head_with_attributes(name).await?;
        Ok(self.raw_object(name, &result))
    }

    async fn list_objects(&self, options: ListObjectsOptions) -> BackendResult<Vec<RawObject>> {
        let prefix = options.prefix.unwrap_or_default();
        // object_store lists by whole path segments, Swift by string prefix.
        let scope = match prefix.rfind('/') {
            Some(idx) => self.path(&prefix[..idx]),
            None => Path::from(self.name.as_str()),
        };

        let mut names: Vec<String> = self
            .store
            .list(Some(&scope))
            .map_ok(|meta| self.object_name(&meta.location))
            .try_filter(|name| {
                let after_marker = options.marker.as_ref().map_or(true, |m| name > m);
                futures::future::ready(name.starts_with(&prefix) && after_marker)
            })
            .try_collect()
            .await
            .map_err(|e| store_error(&prefix, e))?;
        names.sort();
        if let Some(limit) = options.limit {
            names.truncate(limit);
        }

        let mut objects = Vec::with_capacity(names.len());
        for name in names {
            objects.push(self.object_info(&name).await?);
        }
        Ok(objects)
    }

    async fn delete_object(&self, name: &str) -> BackendResult<()> {
        let path = self.path(name);
        // Swift answers 404 for a missing object; InMemory deletes silently.
        self.store
            .head(&path)
            .await
            .map_err(|e| store_error(name, e))?;
        self.store
            .delete(&path)
            .await
            .map_err(|e| store_error(name, e))
    }
}
