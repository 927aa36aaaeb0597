//! Built-in wire formats and the format registry.

use bytes::Bytes;
use hermes_core::{ApiError, ApiResult, Format};
use serde_json::{Map, Value};
use std::sync::Arc;

/// JSON, the default format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl Format for JsonFormat {
    fn mime(&self) -> &str {
        "application/json"
    }

    fn extension(&self) -> &str {
        "json"
    }

    fn encode(&self, data: &Value, pretty: bool) -> ApiResult<Bytes> {
        let bytes = if pretty {
            serde_json::to_vec_pretty(data)
        } else {
            serde_json::to_vec(data)
        };
        bytes
            .map(Bytes::from)
            .map_err(|e| ApiError::internal_with_source("failed to encode JSON", e))
    }

    fn decode(&self, bytes: &[u8]) -> ApiResult<Value> {
        serde_json::from_slice(bytes)
            .map_err(|e| ApiError::bad_request(format!("Error parsing JSON: {e}")))
    }
}

/// `application/x-www-form-urlencoded` request bodies.
///
/// Decodes to an object of strings; only flat objects can be encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEncodedFormat;

impl Format for UrlEncodedFormat {
    fn mime(&self) -> &str {
        "application/x-www-form-urlencoded"
    }

    fn extension(&self) -> &str {
        "post"
    }

    fn encode(&self, data: &Value, _pretty: bool) -> ApiResult<Bytes> {
        let Value::Object(map) = data else {
            return Err(ApiError::internal("only objects can be form encoded"));
        };
        let pairs: Vec<(&str, String)> = map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k.as_str(), s.clone()),
                other => (k.as_str(), other.to_string()),
            })
            .collect();
        serde_urlencoded::to_string(pairs)
            .map(Bytes::from)
            .map_err(|e| ApiError::internal_with_source("failed to form encode", e))
    }

    fn decode(&self, bytes: &[u8]) -> ApiResult<Value> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)
            .map_err(|e| ApiError::bad_request(format!("Error parsing form data: {e}")))?;
        Ok(Value::Object(collect_pairs(pairs)))
    }
}

/// Folds url-encoded pairs into an object.
///
/// A key that repeats, or that ends in `[]`, becomes an array of its values
/// in request order. `ids[]=1&ids[]=2` and `ids=1&ids=2` both yield
/// `{"ids": ["1", "2"]}`.
pub(crate) fn collect_pairs(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut fields = Map::new();
    for (key, value) in pairs {
        let (name, listed) = match key.strip_suffix("[]") {
            Some(name) => (name.to_string(), true),
            None => (key, false),
        };
        let value = Value::String(value);
        match fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None if listed => {
                fields.insert(name, Value::Array(vec![value]));
            }
            None => {
                fields.insert(name, value);
            }
        }
    }
    fields
}

/// Registered formats, in registration order. The first is the default.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    formats: Vec<Arc<dyn Format>>,
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.formats.iter().map(|format| format.mime()))
            .finish()
    }
}

impl FormatRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a format.
    pub fn register(&mut self, format: Arc<dyn Format>) {
        self.formats.push(format);
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Iterates in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Format>> {
        self.formats.iter()
    }

    /// The first registered format.
    #[must_use]
    pub fn default_format(&self) -> Option<&Arc<dyn Format>> {
        self.formats.first()
    }

    /// Finds the format handling `mime` (parameters such as `charset` are
    /// ignored).
    #[must_use]
    pub fn by_mime(&self, mime: &str) -> Option<&Arc<dyn Format>> {
        let mime = essence(mime);
        self.formats.iter().find(|format| {
            format
                .supported_media_types()
                .keys()
                .any(|m| m.eq_ignore_ascii_case(&mime))
        })
    }

    /// Finds the format for a file extension.
    #[must_use]
    pub fn by_extension(&self, extension: &str) -> Option<&Arc<dyn Format>> {
        self.formats.iter().find(|format| {
            format
                .supported_media_types()
                .values()
                .any(|e| e.eq_ignore_ascii_case(extension))
        })
    }
}

/// The media type without parameters, lower-cased.
pub(crate) fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
