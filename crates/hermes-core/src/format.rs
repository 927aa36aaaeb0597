//! Wire format contract.

use crate::error::ApiResult;
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;

/// Encodes responses and decodes request bodies for one media type family.
pub trait Format: Send + Sync + 'static {
    /// Primary media type, e.g. `application/json`.
    fn mime(&self) -> &str;

    /// File extension, e.g. `json`.
    fn extension(&self) -> &str;

    /// Every media type the format handles, mapped to its extension.
    fn supported_media_types(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.mime().to_string(), self.extension().to_string())])
    }

    /// Serializes a composed value.
    fn encode(&self, data: &Value, pretty: bool) -> ApiResult<Bytes>;

    /// Parses a request body.
    fn decode(&self, bytes: &[u8]) -> ApiResult<Value>;
}
