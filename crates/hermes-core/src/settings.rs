//! Process-wide dispatch settings.
//!
//! [`Settings`] holds the defaults loaded at startup. The dispatcher clones
//! them into every [`RequestContext`](crate::RequestContext) and applies
//! endpoint overrides to that copy only, so concurrent requests never observe
//! each other's overrides.

use crate::route::{AccessLevel, RouteMetadata};
use serde::{Deserialize, Serialize};

/// All dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Versioning, access and debug settings.
    pub api: ApiSettings,
    /// Route table builder settings.
    pub routing: RoutingSettings,
    /// Content negotiation settings.
    pub negotiation: NegotiationSettings,
    /// Response header and body settings.
    pub response: ResponseSettings,
    /// Cross-origin settings.
    pub cors: CorsSettings,
}

impl Settings {
    /// Applies the overrides a route declares in its documentation.
    ///
    /// Only cache headers and throttle are request-time settings; everything
    /// else on the route is consumed at registration.
    pub fn apply_route_overrides(&mut self, metadata: &RouteMetadata) {
        if let Some(cache_control) = &metadata.cache_control {
            self.response.cache_control.clone_from(cache_control);
        }
        if let Some(expires) = metadata.expires {
            self.response.expires = expires;
        }
        if let Some(throttle_ms) = metadata.throttle_ms {
            self.response.throttle_ms = throttle_ms;
        }
    }

    /// Returns true if `version` is within the supported range.
    #[must_use]
    pub fn supports_version(&self, version: u32) -> bool {
        (self.api.min_version..=self.api.max_version).contains(&version)
    }
}

/// Versioning, access and debug settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    /// Lowest supported API version.
    pub min_version: u32,
    /// Highest supported API version.
    pub max_version: u32,
    /// Vendor name used in `application/vnd.{vendor}-v{N}+{ext}` media types.
    pub vendor: Option<String>,
    /// Select the API version from a vendor media type in `Accept`.
    pub use_vendor_mime_versioning: bool,
    /// Select the API version from a leading `v{N}` path segment.
    pub use_url_based_versioning: bool,
    /// Access level applied to every route; the effective level is the
    /// maximum of this and the route's own level.
    pub access_level: AccessLevel,
    /// Include diagnostics in error bodies.
    pub debug: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            min_version: 1,
            max_version: 1,
            vendor: None,
            use_vendor_mime_versioning: false,
            use_url_based_versioning: false,
            access_level: AccessLevel::Public,
            debug: false,
        }
    }
}

/// Route table builder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingSettings {
    /// Register one maximal URL per method instead of every prefix.
    pub smart_auto_routing: bool,
    /// Bind a bare request body to a lone body parameter.
    pub smart_parameter_parsing: bool,
    /// Parameter name that receives the whole decoded request body.
    pub full_request_data_name: String,
    /// Required scalar parameters with these names are read from the path.
    pub prefixing_parameter_names: Vec<String>,
    /// Persist the built route table in the cache store.
    pub cache_routes: bool,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            smart_auto_routing: true,
            smart_parameter_parsing: true,
            full_request_data_name: "request_data".to_string(),
            prefixing_parameter_names: vec!["id".to_string()],
            cache_routes: false,
        }
    }
}

/// Content negotiation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NegotiationSettings {
    /// Charsets the API can answer in.
    pub supported_charsets: Vec<String>,
    /// Charset used when the client expresses no preference.
    pub charset: String,
    /// Languages the API can answer in.
    pub supported_languages: Vec<String>,
    /// Language used when the client expresses no preference.
    pub language: String,
    /// Status for request bodies in an unregistered format (415 or 403).
    pub unsupported_media_type_status: u16,
}

impl Default for NegotiationSettings {
    fn default() -> Self {
        Self {
            supported_charsets: vec!["utf-8".to_string()],
            charset: "utf-8".to_string(),
            supported_languages: vec!["en".to_string()],
            language: "en".to_string(),
            unsupported_media_type_status: 415,
        }
    }
}

/// Response header and body settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponseSettings {
    /// `Cache-Control` sent when `expires` is zero.
    pub cache_control: String,
    /// Seconds a response may be cached; zero disables caching.
    pub expires: u64,
    /// Minimum response latency in milliseconds.
    pub throttle_ms: u64,
    /// Answer a `null` result with an empty body.
    pub empty_body_for_null: bool,
    /// Validate parameters before invocation.
    pub auto_validation: bool,
}

impl Default for ResponseSettings {
    fn default() -> Self {
        Self {
            cache_control: "no-cache, must-revalidate".to_string(),
            expires: 0,
            throttle_ms: 0,
            empty_body_for_null: true,
            auto_validation: true,
        }
    }
}

/// Cross-origin settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsSettings {
    /// Emit `Access-Control-Allow-*` headers.
    pub enabled: bool,
    /// Allowed origin; `*` echoes the request origin.
    pub allow_origin: String,
    /// Value of `Access-Control-Allow-Methods`.
    pub allow_methods: String,
    /// Value of `Access-Control-Max-Age`.
    pub max_age_secs: u64,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, PATCH, DELETE, OPTIONS, HEAD".to_string(),
            max_age_secs: 86_400,
        }
    }
}
