//! HTTP client for the OpenStack Swift object API.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED,
};
use reqwest::{Body, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::{
    BackendResult, Container, CreateObject, ListObjectsOptions, ObjectContent, ObjectStoreService,
    OpenStackClient, StorageObject,
};
use crate::error::BackendError;
use crate::normalize::RawObject;
use crate::options::ObjectOptions;
use crate::path::{contains_dot_segment, encode_path};
use crate::{Error, Result};

/// Swift client configuration
#[derive(Debug, Clone)]
pub struct SwiftConfig {
    /// Object-store endpoint, e.g. `https://swift.example.com/v1/AUTH_project`
    pub storage_url: String,
    /// Keystone token sent as `X-Auth-Token`
    pub auth_token: String,
}

/// Swift object API over HTTP.
///
/// Token issuance is left to the caller; the client only presents the
/// token it was given.
#[derive(Clone)]
pub struct SwiftClient {
    http: reqwest::Client,
    storage_url: Url,
    auth_token: HeaderValue,
}

impl SwiftClient {
    pub fn new(config: SwiftConfig) -> Result<Self> {
        let mut storage_url = Url::parse(&config.storage_url)
            .map_err(|e| Error::Config(format!("Invalid Swift storage URL: {}", e)))?;
        if !storage_url.path().ends_with('/') {
            let path = format!("{}/", storage_url.path());
            storage_url.set_path(&path);
        }

        let mut auth_token = HeaderValue::from_str(&config.auth_token)
            .map_err(|e| Error::Config(format!("Invalid Swift auth token: {}", e)))?;
        auth_token.set_sensitive(true);

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!("Created Swift client for endpoint: {}", storage_url);

        Ok(Self {
            http,
            storage_url,
            auth_token,
        })
    }
}

#[async_trait]
impl OpenStackClient for SwiftClient {
    async fn object_store_v1(&self) -> BackendResult<Arc<dyn ObjectStoreService>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ObjectStoreService for SwiftClient {
    async fn get_container(&self, name: &str) -> BackendResult<Arc<dyn Container>> {
        if name.is_empty() || name.contains('/') || contains_dot_segment(name) {
            return Err(BackendError::InvalidRequest(format!(
                "Invalid container name: {:?}",
                name
            )));
        }
        let container_url = self
            .storage_url
            .join(&format!("{}/", encode_path(name)))
            .map_err(|e| BackendError::InvalidRequest(format!("Invalid container name: {}", e)))?;
        Ok(Arc::new(SwiftContainer {
            http: self.http.clone(),
            auth_token: self.auth_token.clone(),
            container_url,
            name: name.to_string(),
        }))
    }
}

struct SwiftContainer {
    http: reqwest::Client,
    auth_token: HeaderValue,
    /// Ends in `/`
    container_url: Url,
    name: String,
}

/// One entry of a `format=json` container listing.
#[derive(Debug, Deserialize)]
struct ListingEntry {
    name: String,
    #[serde(default)]
    bytes: Option<u64>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    last_modified: Option<String>,
}

impl From<ListingEntry> for RawObject {
    fn from(entry: ListingEntry) -> Self {
        RawObject {
            name: entry.name,
            content_type: entry.content_type,
            content_length: entry.bytes,
            last_modified: entry.last_modified.as_deref().and_then(parse_listing_timestamp),
        }
    }
}

/// Listing timestamps carry no zone and are UTC: `2024-05-01T10:20:30.123456`.
fn parse_listing_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn raw_from_headers(name: &str, headers: &HeaderMap) -> RawObject {
    let header = |key: HeaderName| headers.get(key).and_then(|v| v.to_str().ok());
    RawObject {
        name: name.to_string(),
        content_type: header(CONTENT_TYPE).map(str::to_string),
        content_length: header(CONTENT_LENGTH).and_then(|v| v.parse().ok()),
        last_modified: header(LAST_MODIFIED)
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|ts| ts.with_timezone(&Utc)),
    }
}

/// Request headers for an object upload.
fn upload_headers(options: &ObjectOptions) -> BackendResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut set = |name: &str, value: &str| -> BackendResult<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| BackendError::InvalidRequest(format!("Invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| BackendError::InvalidRequest(format!("Invalid header value: {}", e)))?;
        headers.insert(name, value);
        Ok(())
    };

    for (name, value) in &options.headers {
        set(name, value)?;
    }
    if let Some(ct) = &options.content_type {
        set("content-type", ct)?;
    }
    if let Some(encoding) = &options.content_encoding {
        set("content-encoding", encoding)?;
    }
    if let Some(disposition) = &options.content_disposition {
        set("content-disposition", disposition)?;
    }
    if let Some(after) = options.delete_after {
        set("x-delete-after", &after.to_string())?;
    }
    if let Some(at) = options.delete_at {
        set("x-delete-at", &at.to_string())?;
    }
    if options.detect_content_type == Some(true) {
        set("x-detect-content-type", "true")?;
    }
    for (key, value) in &options.metadata {
        set(&format!("x-object-meta-{}", key), value)?;
    }
    Ok(headers)
}

/// Map non-success statuses to errors.
fn check_status(response: Response, name: &str) -> BackendResult<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(BackendError::NotFound(name.to_string())),
        status => Err(BackendError::Http {
            status: status.as_u16(),
            path: name.to_string(),
        }),
    }
}

impl SwiftContainer {
    /// URL of an object, always below the container URL.
    fn object_url(&self, name: &str) -> BackendResult<Url> {
        // An empty name addresses the container itself.
        if name.is_empty() {
            return Err(BackendError::NotFound(name.to_string()));
        }
        if name.starts_with('/') || contains_dot_segment(name) {
            return Err(BackendError::InvalidRequest(format!(
                "Path traversal detected: {}",
                name
            )));
        }
        self.container_url
            .join(&encode_path(name))
            .map_err(|e| BackendError::InvalidRequest(format!("Invalid object name {}: {}", name, e)))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("x-auth-token", self.auth_token.clone())
    }

    async fn head(&self, name: &str) -> BackendResult<Response> {
        let url = self.object_url(name)?;
        debug!("Swift HEAD: {}", url);
        Ok(self.request(reqwest::Method::HEAD, url).send().await?)
    }
}

#[async_trait]
impl Container for SwiftContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn object_exists(&self, name: &str) -> BackendResult<bool> {
        if name.is_empty() {
            return Ok(false);
        }
        let response = self.head(name).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => check_status(response, name).map(|_| true),
        }
    }

    async fn create_object(&self, object: CreateObject) -> BackendResult<()> {
        let url = self.object_url(&object.name)?;
        let headers = upload_headers(&object.options)?;
        let body = match object.content {
            ObjectContent::Bytes(data) => Body::from(data),
            ObjectContent::Stream(stream) => Body::wrap_stream(stream),
        };
        debug!("Swift PUT: {}", url);
        let response = self
            .request(reqwest::Method::PUT, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        check_status(response, &object.name)?;
        Ok(())
    }

    async fn get_object(&self, name: &str) -> BackendResult<StorageObject> {
        let url = self.object_url(name)?;
        debug!("Swift GET: {}", url);
        let response = check_status(self.request(reqwest::Method::GET, url).send().await?, name)?;
        let info = raw_from_headers(name, response.headers());
        let content = response
            .bytes_stream()
            .map_err(BackendError::from)
            .boxed();
        Ok(StorageObject { info, content })
    }

    async fn object_info(&self, name: &str) -> BackendResult<RawObject> {
        let response = check_status(self.head(name).await?, name)?;
        Ok(raw_from_headers(name, response.headers()))
    }

    async fn list_objects(&self, options: ListObjectsOptions) -> BackendResult<Vec<RawObject>> {
        let mut url = self.container_url.clone();
        // Listing targets the container itself, without the trailing slash.
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("format", "json");
            if let Some(prefix) = &options.prefix {
                query.append_pair("prefix", prefix);
            }
            if let Some(marker) = &options.marker {
                query.append_pair("marker", marker);
            }
            if let Some(limit) = options.limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        debug!("Swift LIST: {}", url);

        let response = check_status(self.request(reqwest::Method::GET, url).send().await?, &self.name)?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let body = response.bytes().await?;
        parse_listing(&body)
    }

    async fn delete_object(&self, name: &str) -> BackendResult<()> {
        let url = self.object_url(name)?;
        debug!("Swift DELETE: {}", url);
        let response = self.request(reqwest::Method::DELETE, url).send().await?;
        check_status(response, name)?;
        Ok(())
    }
}

fn parse_listing(body: &[u8]) -> BackendResult<Vec<RawObject>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let entries: Vec<ListingEntry> = serde_json::from_slice(body)?;
    Ok(entries.into_iter().map(RawObject::from).collect())
}
