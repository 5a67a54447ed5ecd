//! In-process WebDAV server for testing.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{mkcol, BackendResult, DavResource, DavResponse, Depth, WebDavClient};
use crate::error::BackendError;

#[derive(Debug, Clone)]
enum Node {
    Collection {
        modified: DateTime<Utc>,
    },
    File {
        data: Bytes,
        content_type: Option<String>,
        modified: DateTime<Utc>,
    },
}

/// Collection-aware WebDAV semantics over a map.
///
/// Behaves like a strict server: `PUT` and `MKCOL` answer 409 when the
/// parent collection is missing, `MKCOL` answers 405 for an existing
/// resource, and `DELETE` of a collection removes everything below it.
/// Every request is recorded so tests can inspect what was sent.
#[derive(Clone, Default)]
pub struct MemoryDavClient {
    nodes: Arc<Mutex<BTreeMap<String, Node>>>,
    requests: Arc<Mutex<Vec<(Method, String)>>>,
}

impl MemoryDavClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Method and raw (still encoded) path of every request so far.
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.requests.lock().clone()
    }

    /// Number of stored resources, collections included.
    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }
}

fn decode(path: &str) -> BackendResult<String> {
    urlencoding::decode(path)
        .map(|p| p.trim_matches('/').to_string())
        .map_err(|e| BackendError::InvalidRequest(format!("Invalid path encoding {}: {}", path, e)))
}

fn parent(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

fn is_below(candidate: &str, path: &str) -> bool {
    path.is_empty() || candidate.starts_with(&format!("{}/", path))
}

fn response(status: u16) -> DavResponse {
    DavResponse {
        status,
        headers: HeaderMap::new(),
        body: Bytes::new(),
    }
}

/// The root collection always exists.
fn collection_exists(nodes: &BTreeMap<String, Node>, path: &str) -> bool {
    path.is_empty() || matches!(nodes.get(path), Some(Node::Collection { .. }))
}

fn resource(path: &str, node: &Node) -> DavResource {
    match node {
        Node::Collection { modified } => DavResource {
            path: path.to_string(),
            is_collection: true,
            last_modified: Some(*modified),
            ..Default::default()
        },
        Node::File {
            data,
            content_type,
            modified,
        } => DavResource {
            path: path.to_string(),
            is_collection: false,
            content_type: content_type.clone(),
            content_length: Some(data.len() as u64),
            last_modified: Some(*modified),
        },
    }
}

#[async_trait]
impl WebDavClient for MemoryDavClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        headers: HeaderMap,
    ) -> BackendResult<DavResponse> {
        self.requests.lock().push((method.clone(), path.to_string()));
        let path = decode(path)?;
        let mut nodes = self.nodes.lock();

        let dav = match method {
            Method::GET => match nodes.get(&path) {
                Some(Node::File { data, .. }) => DavResponse {
                    body: data.clone(),
                    ..response(200)
                },
                Some(Node::Collection { .. }) => response(405),
                None => response(404),
            },
            Method::PUT => {
                if !collection_exists(&nodes, parent(&path)) {
                    response(409)
                } else if path.is_empty() || collection_exists(&nodes, &path) {
                    response(405)
                } else {
                    let content_type = headers
                        .get(CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let existed = nodes.contains_key(&path);
                    nodes.insert(
                        path,
                        Node::File {
                            data: body,
                            content_type,
                            modified: Utc::now(),
                        },
                    );
                    response(if existed { 204 } else { 201 })
                }
            }
            Method::DELETE => {
                if path.is_empty() || !nodes.contains_key(&path) {
                    response(404)
                } else {
                    nodes.retain(|key, _| key != &path && !is_below(key, &path));
                    response(204)
                }
            }
            m if m == mkcol() => {
                if path.is_empty() || nodes.contains_key(&path) {
                    response(405)
                } else if !collection_exists(&nodes, parent(&path)) {
                    response(409)
                } else {
                    nodes.insert(
                        path,
                        Node::Collection {
                            modified: Utc::now(),
                        },
                    );
                    response(201)
                }
            }
            _ => response(501),
        };
        Ok(dav)
    }

    async fn prop_find(&self, path: &str, depth: Depth) -> BackendResult<Vec<DavResource>> {
        self.requests
            .lock()
            .push((super::propfind(), path.to_string()));
        let path = decode(path)?;
        let nodes = self.nodes.lock();

        let root = Node::Collection {
            modified: DateTime::<Utc>::default(),
        };
        let node = match nodes.get(&path) {
            Some(node) => node,
            None if path.is_empty() => &root,
            None => return Err(BackendError::NotFound(path)),
        };

        let mut resources = vec![resource(&path, node)];
        if depth != Depth::Zero && matches!(node, Node::Collection { .. }) {
            for (key, child) in nodes.iter() {
                if !is_below(key, &path) || key == &path {
                    continue;
                }
                let direct = parent(key) == path;
                if depth == Depth::Infinity || direct {
                    resources.push(resource(key, child));
                }
            }
        }
        Ok(resources)
    }
}
