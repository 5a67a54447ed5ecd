//! HTTP client for WebDAV servers.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use tracing::{debug, info};
use url::Url;

use super::{propfind, BackendResult, DavResource, DavResponse, Depth, WebDavClient};
use crate::error::BackendError;
use crate::{Error, Result};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontenttype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
  </d:prop>
</d:propfind>"#;

/// WebDAV client configuration
#[derive(Debug, Clone)]
pub struct HttpDavConfig {
    /// Collection URL every path is resolved against
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// WebDAV over HTTP with optional basic authentication.
pub struct HttpDavClient {
    http: reqwest::Client,
    /// Ends in `/`
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl HttpDavClient {
    pub fn new(config: HttpDavConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid WebDAV base URL: {}", e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Created WebDAV client for {} (user: {:?})",
            base_url, config.username
        );

        Ok(Self {
            http,
            base_url,
            username: config.username,
            password: config.password,
        })
    }

    /// URL of an encoded path, always below the base URL.
    fn url(&self, path: &str) -> BackendResult<Url> {
        let relative = path.trim_start_matches('/');
        // URL parsing resolves dot segments, percent-encoded ones included.
        let climbs = relative.split('/').any(|segment| {
            urlencoding::decode(segment).is_ok_and(|decoded| decoded == "." || decoded == "..")
        });
        if climbs {
            return Err(BackendError::InvalidRequest(format!(
                "Path traversal detected: {}",
                path
            )));
        }
        self.base_url
            .join(relative)
            .map_err(|e| BackendError::InvalidRequest(format!("Invalid path {}: {}", path, e)))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        headers: HeaderMap,
    ) -> BackendResult<DavResponse> {
        let url = self.url(path)?;
        debug!("WebDAV {}: {}", method, url);
        let mut request = self.http.request(method, url).headers(headers).body(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }
        let response = request.send().await?;
        Ok(DavResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            body: response.bytes().await?,
        })
    }
}

#[async_trait]
impl WebDavClient for HttpDavClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        headers: HeaderMap,
    ) -> BackendResult<DavResponse> {
        self.send(method, path, body, headers).await
    }

    async fn prop_find(&self, path: &str, depth: Depth) -> BackendResult<Vec<DavResource>> {
        let mut headers = HeaderMap::new();
        headers.insert("depth", HeaderValue::from_static(depth.as_str()));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/xml; charset=utf-8"),
        );
        let response = self
            .send(propfind(), path, Bytes::from_static(PROPFIND_BODY.as_bytes()), headers)
            .await?;
        match response.status {
            207 => parse_multistatus(&response.body, self.base_url.path()),
            404 => Err(BackendError::NotFound(path.to_string())),
            status => Err(BackendError::Http {
                status,
                path: path.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy)]
enum Field {
    Href,
    ContentType,
    ContentLength,
    LastModified,
}

/// Parse a `207 Multi-Status` body.
///
/// `base_path` is the URL path of the client's base collection; returned
/// resource paths are relative to it.
pub fn parse_multistatus(body: &[u8], base_path: &str) -> BackendResult<Vec<DavResource>> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut resources = Vec::new();
    let mut current: Option<DavResource> = None;
    let mut field: Option<Field> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"response" => current = Some(DavResource::default()),
                b"collection" => {
                    if let Some(resource) = current.as_mut() {
                        resource.is_collection = true;
                    }
                }
                b"href" => field = Some(Field::Href),
                b"getcontenttype" => field = Some(Field::ContentType),
                b"getcontentlength" => field = Some(Field::ContentLength),
                b"getlastmodified" => field = Some(Field::LastModified),
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"collection" {
                    if let Some(resource) = current.as_mut() {
                        resource.is_collection = true;
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(field), Some(resource)) = (field, current.as_mut()) {
                    let text = t.unescape()?;
                    let text = text.trim();
                    match field {
                        Field::Href => resource.path = href_to_path(text, base_path),
                        Field::ContentType => resource.content_type = Some(text.to_string()),
                        Field::ContentLength => resource.content_length = text.parse().ok(),
                        Field::LastModified => {
                            resource.last_modified = DateTime::parse_from_rfc2822(text)
                                .ok()
                                .map(|ts| ts.with_timezone(&Utc))
                        }
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"response" {
                    if let Some(resource) = current.take() {
                        resources.push(resource);
                    }
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(resources)
}

/// Decoded path of `href` relative to `base_path`.
fn href_to_path(href: &str, base_path: &str) -> String {
    let raw = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.to_string(),
    };
    let decoded = decode(&raw);
    let base = decode(base_path);
    let base = base.trim_end_matches('/');

    let relative = match decoded.strip_prefix(base) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => decoded.as_str(),
    };
    relative.trim_matches('/').to_string()
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
