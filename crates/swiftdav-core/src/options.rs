//! Write/create directives passed by callers, and the typed options a
//! backend call is built from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::BackendError;

/// Caller-supplied key/value directives for write and create operations.
///
/// Keys are backend operation parameter names (`contentType`,
/// `deleteAfter`, `metadata`, ...). Which keys a call honors is decided by
/// [`crate::capability::Capabilities`]; everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteConfig {
    values: Map<String, Value>,
}

impl WriteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// The value for `key` if it is set to something truthy.
    pub fn truthy(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| is_truthy(v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Value)> for WriteConfig {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Null, `false`, zero, the empty string and empty collections are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Filtered directives for one backend call.
pub type Payload = Map<String, Value>;

/// Typed view of a [`Payload`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectOptions {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    /// Seconds until the backend expires the object
    pub delete_after: Option<u64>,
    /// Unix timestamp at which the backend expires the object
    pub delete_at: Option<u64>,
    pub detect_content_type: Option<bool>,
    /// User metadata, sent as `X-Object-Meta-*`
    pub metadata: BTreeMap<String, String>,
    /// Raw extra request headers
    pub headers: BTreeMap<String, String>,
}

impl ObjectOptions {
    pub fn from_payload(payload: Payload) -> Result<Self, BackendError> {
        serde_json::from_value(Value::Object(payload))
            .map_err(|e| BackendError::InvalidRequest(format!("Invalid write options: {}", e)))
    }
}
