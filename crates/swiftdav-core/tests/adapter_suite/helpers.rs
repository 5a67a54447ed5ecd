//! Test helper utilities.
//!
//! Adapter constructors over the in-process backends, plus wrappers that
//! inject faults into deletes, listings and lookups.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use swiftdav_core::openstack::{
    BackendResult, Container, CreateObject, ListObjectsOptions, ObjectStoreService,
    OpenStackClient, StorageObject,
};
use swiftdav_core::normalize::RawObject;
use swiftdav_core::webdav::{DavResource, DavResponse, Depth, WebDavClient};
use swiftdav_core::{
    BackendError, MemoryDavClient, MemoryObjectStore, OpenStackAdapter, WebDavAdapter,
};

/// Route adapter logs to the test output. `RUST_LOG=debug` shows every
/// backend call.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn openstack_adapter(prefix: &str) -> (MemoryObjectStore, OpenStackAdapter) {
    init_tracing();
    let store = MemoryObjectStore::new();
    let adapter = OpenStackAdapter::new(Arc::new(store.clone()), "test-container", prefix);
    (store, adapter)
}

pub fn webdav_adapter(prefix: &str) -> (MemoryDavClient, WebDavAdapter) {
    init_tracing();
    let client = MemoryDavClient::new();
    let adapter = WebDavAdapter::new(Arc::new(client.clone()), prefix);
    (client, adapter)
}

/// Which calls a faulty backend should fail. Counters are shared between
/// clones so a test can inspect them after handing one to an adapter.
#[derive(Clone, Default)]
struct Faults {
    /// 1-based; 0 never fails
    delete_on: usize,
    /// 1-based; 0 never fails
    listing_on: usize,
    lookups: bool,
    deletes: Arc<AtomicUsize>,
    listings: Arc<AtomicUsize>,
}

impl Faults {
    fn delete_fails(&self) -> bool {
        self.deletes.fetch_add(1, Ordering::SeqCst) + 1 == self.delete_on
    }

    fn listing_fails(&self) -> bool {
        self.listings.fetch_add(1, Ordering::SeqCst) + 1 == self.listing_on
    }
}

fn unavailable(path: &str) -> BackendError {
    BackendError::Http {
        status: 503,
        path: path.to_string(),
    }
}

/// Object store whose `fail_on`-th delete removes the object and then
/// reports a server error, as when the response is lost. Listing pages and
/// HEAD lookups can be made to fail with 503 too.
#[derive(Clone)]
pub struct FaultyObjectStore {
    inner: MemoryObjectStore,
    faults: Faults,
}

impl FaultyObjectStore {
    pub fn new(inner: MemoryObjectStore, fail_on: usize) -> Self {
        Self {
            inner,
            faults: Faults {
                delete_on: fail_on,
                ..Default::default()
            },
        }
    }

    /// Fail the `n`-th `list_objects` call.
    pub fn failing_listing_page(mut self, n: usize) -> Self {
        self.faults.listing_on = n;
        self
    }

    /// Fail every `object_exists` and `object_info` call.
    pub fn failing_lookups(mut self) -> Self {
        self.faults.lookups = true;
        self
    }

    pub fn deletes(&self) -> usize {
        self.faults.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OpenStackClient for FaultyObjectStore {
    async fn object_store_v1(&self) -> BackendResult<Arc<dyn ObjectStoreService>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ObjectStoreService for FaultyObjectStore {
    async fn get_container(&self, name: &str) -> BackendResult<Arc<dyn Container>> {
        let inner = self.inner.get_container(name).await?;
        Ok(Arc::new(FaultyContainer {
            inner,
            faults: self.faults.clone(),
        }))
    }
}

struct FaultyContainer {
    inner: Arc<dyn Container>,
    faults: Faults,
}

#[async_trait]
impl Container for FaultyContainer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn object_exists(&self, name: &str) -> BackendResult<bool> {
        if self.faults.lookups {
            return Err(unavailable(name));
        }
        self.inner.object_exists(name).await
    }

    async fn create_object(&self, object: CreateObject) -> BackendResult<()> {
        self.inner.create_object(object).await
    }

    async fn get_object(&self, name: &str) -> BackendResult<StorageObject> {
        self.inner.get_object(name).await
    }

    async fn object_info(&self, name: &str) -> BackendResult<RawObject> {
        if self.faults.lookups {
            return Err(unavailable(name));
        }
        self.inner.object_info(name).await
    }

    async fn list_objects(&self, options: ListObjectsOptions) -> BackendResult<Vec<RawObject>> {
        if self.faults.listing_fails() {
            return Err(unavailable(options.prefix.as_deref().unwrap_or("")));
        }
        self.inner.list_objects(options).await
    }

    async fn delete_object(&self, name: &str) -> BackendResult<()> {
        self.inner.delete_object(name).await?;
        if self.faults.delete_fails() {
            return Err(BackendError::Http {
                status: 500,
                path: name.to_string(),
            });
        }
        Ok(())
    }
}

/// WebDAV server whose `fail_on`-th `DELETE` is applied and then answered
/// with 500. PROPFIND at a chosen depth can be made to fail with 503.
#[derive(Clone)]
pub struct FaultyDavClient {
    inner: MemoryDavClient,
    faults: Faults,
    failing_depth: Option<Depth>,
}

impl FaultyDavClient {
    pub fn new(inner: MemoryDavClient, fail_on: usize) -> Self {
        Self {
            inner,
            faults: Faults {
                delete_on: fail_on,
                ..Default::default()
            },
            failing_depth: None,
        }
    }

    /// Fail every PROPFIND sent with `depth`.
    pub fn failing_prop_find(mut self, depth: Depth) -> Self {
        self.failing_depth = Some(depth);
        self
    }

    pub fn deletes(&self) -> usize {
        self.faults.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebDavClient for FaultyDavClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        headers: HeaderMap,
    ) -> BackendResult<DavResponse> {
        let is_delete = method == Method::DELETE;
        let mut response = self.inner.request(method, path, body, headers).await?;
        if is_delete && self.faults.delete_fails() {
            response.status = 500;
        }
        Ok(response)
    }

    async fn prop_find(&self, path: &str, depth: Depth) -> BackendResult<Vec<DavResource>> {
        if self.failing_depth == Some(depth) {
            return Err(unavailable(path));
        }
        self.inner.prop_find(path, depth).await
    }
}
