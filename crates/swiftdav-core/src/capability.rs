//! Which write/create directives each backend operation accepts.
//!
//! Backends reject parameters their operations do not know, so a caller's
//! [`WriteConfig`] is filtered down to the declared keys before a request is
//! built. The tables mirror the parameter lists of the Swift object API and
//! of the WebDAV methods the adapter issues.

use crate::options::{Payload, WriteConfig};

/// Backend operations that take caller directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Object upload
    Put,
    /// Directory marker / collection creation
    Post,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Put => "put",
            Operation::Post => "post",
        }
    }
}

/// A static operation -> accepted-keys table.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    table: &'static [(Operation, &'static [&'static str])],
}

/// Swift `PUT /{container}/{object}` and `POST /{container}/{object}`.
pub const OPENSTACK: Capabilities = Capabilities {
    table: &[
        (
            Operation::Put,
            &[
                "contentType",
                "contentEncoding",
                "contentDisposition",
                "deleteAfter",
                "deleteAt",
                "detectContentType",
                "metadata",
                "headers",
            ],
        ),
        (
            Operation::Post,
            &[
                "contentDisposition",
                "deleteAfter",
                "deleteAt",
                "metadata",
                "headers",
            ],
        ),
    ],
};

/// WebDAV `PUT` and `MKCOL`.
pub const WEBDAV: Capabilities = Capabilities {
    table: &[
        (Operation::Put, &["contentType", "headers"]),
        (Operation::Post, &["headers"]),
    ],
};

impl Capabilities {
    /// Keys accepted by `operation`; empty when the operation is unknown.
    pub fn accepted(&self, operation: Operation) -> &'static [&'static str] {
        self.table
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, keys)| *keys)
            .unwrap_or(&[])
    }

    pub fn accepts(&self, operation: Operation, key: &str) -> bool {
        self.accepted(operation).contains(&key)
    }

    /// Copy every accepted key with a truthy value from `config`.
    pub fn merge_config(&self, operation: Operation, config: &WriteConfig) -> Payload {
        let mut payload = Payload::new();
        for key in self.accepted(operation) {
            if let Some(value) = config.truthy(key) {
                payload.insert((*key).to_string(), value.clone());
            }
        }
        payload
    }
}
