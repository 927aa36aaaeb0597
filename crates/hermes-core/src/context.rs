//! Per-request state.
//!
//! A [`RequestContext`] is created when dispatch starts, mutated by every
//! pipeline stage, handed to authenticators and filters, and discarded when
//! the response is written. It is never shared between requests.

use crate::method::HttpMethod;
use crate::param::ResolvedParameter;
use crate::route::Route;
use crate::settings::Settings;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// ```
/// use hermes_core::RequestId;
///
/// let a = RequestId::new();
/// let b = RequestId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new time-ordered request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of the authentication stage.
///
/// Hybrid routes proceed even when authentication fails; the two failure
/// shapes stay distinguishable so invoked methods can tell "nobody could
/// check" from "everybody said no".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthOutcome {
    /// The route's effective access level is public.
    #[default]
    NotRequired,
    /// An authenticator accepted the request.
    Authenticated {
        /// Name of the authenticator that accepted it.
        by: String,
    },
    /// Every applicable authenticator rejected a hybrid request.
    Rejected,
    /// No authenticator applied to a hybrid request.
    NoAuthenticator,
}

impl AuthOutcome {
    /// Returns true if an authenticator accepted the request.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// The response format chosen by content negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedFormat {
    /// Media type, e.g. `application/json`.
    pub mime: String,
    /// File extension, e.g. `json`.
    pub extension: String,
    /// The client asked for a vendor media type; echo it in `Content-Type`.
    pub vendor_mime: Option<String>,
}

impl NegotiatedFormat {
    /// Creates a format choice without vendor versioning.
    #[must_use]
    pub fn new(mime: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            extension: extension.into(),
            vendor_mime: None,
        }
    }

    /// Media type to write into `Content-Type`.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.vendor_mime.as_deref().unwrap_or(&self.mime)
    }
}

/// Lifecycle stages of a dispatched request.
///
/// Stages run strictly in declaration order; `Errored` is reachable from any
/// non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Dispatch started.
    Start = 0,
    /// A route was found.
    Routed = 1,
    /// Response format, charset and language were chosen.
    Negotiated = 2,
    /// Filters not depending on authentication passed.
    PreFiltered = 3,
    /// Authentication finished.
    Authenticated = 4,
    /// Filters depending on authentication passed.
    PostFiltered = 5,
    /// Parameters were validated.
    Validated = 6,
    /// The target method returned.
    Invoked = 7,
    /// The result was wrapped in the response envelope.
    Composed = 8,
    /// The response was written.
    Responded = 9,
    /// A stage failed.
    Errored = 10,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Routed => "routed",
            Self::Negotiated => "negotiated",
            Self::PreFiltered => "pre_filtered",
            Self::Authenticated => "authenticated",
            Self::PostFiltered => "post_filtered",
            Self::Validated => "validated",
            Self::Invoked => "invoked",
            Self::Composed => "composed",
            Self::Responded => "responded",
            Self::Errored => "errored",
        }
    }

    /// Returns the successful stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 10] {
        [
            Self::Start,
            Self::Routed,
            Self::Negotiated,
            Self::PreFiltered,
            Self::Authenticated,
            Self::PostFiltered,
            Self::Validated,
            Self::Invoked,
            Self::Composed,
            Self::Responded,
        ]
    }

    /// Returns true for `Responded` and `Errored`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Responded | Self::Errored)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable state carried through one request's dispatch.
///
/// # Example
///
/// ```
/// use hermes_core::{HttpMethod, RequestContext, Settings, Stage};
///
/// let ctx = RequestContext::new(HttpMethod::Get, "/authors/42", Settings::default());
/// assert_eq!(ctx.path(), "authors/42");
/// assert_eq!(ctx.stage(), Stage::Start);
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    method: HttpMethod,
    raw_path: String,
    path: String,
    headers: HeaderMap,
    query: IndexMap<String, String>,
    body: Option<Value>,
    request_data: Map<String, Value>,
    version: u32,
    settings: Settings,
    route: Option<Arc<Route>>,
    parameters: Vec<ResolvedParameter>,
    wildcard_args: Vec<String>,
    auth: AuthOutcome,
    identity: Option<String>,
    format: Option<NegotiatedFormat>,
    request_format: Option<String>,
    charset: String,
    language: String,
    vary_accept: bool,
    response_headers: HeaderMap,
    status: Option<StatusCode>,
    stage: Stage,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context for `method` on `path`, snapshotting `settings`.
    ///
    /// Leading and trailing whitespace and a single leading slash are
    /// stripped from the path; the version defaults to the minimum version.
    #[must_use]
    pub fn new(method: HttpMethod, path: &str, settings: Settings) -> Self {
        let raw_path = path.to_string();
        let path = path.trim().trim_start_matches('/').to_string();
        Self {
            request_id: RequestId::new(),
            method,
            raw_path,
            path,
            headers: HeaderMap::new(),
            query: IndexMap::new(),
            body: None,
            request_data: Map::new(),
            version: settings.api.min_version,
            charset: settings.negotiation.charset.clone(),
            language: settings.negotiation.language.clone(),
            settings,
            route: None,
            parameters: Vec::new(),
            wildcard_args: Vec::new(),
            auth: AuthOutcome::NotRequired,
            identity: None,
            format: None,
            request_format: None,
            vary_accept: false,
            response_headers: HeaderMap::new(),
            status: None,
            stage: Stage::Start,
            started_at: Instant::now(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the verb the request was routed with.
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Replaces the verb, used when `HEAD` falls back to `GET`.
    pub fn set_method(&mut self, method: HttpMethod) {
        self.method = method;
    }

    /// Returns the path as received.
    #[must_use]
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// Returns the routing path, without leading slash, extension or version.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Replaces the routing path.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a mutable reference to the request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns a request header as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the query string pairs in request order. A repeated key keeps
    /// its last value here; the request data holds the full list.
    #[must_use]
    pub fn query(&self) -> &IndexMap<String, String> {
        &self.query
    }

    /// Replaces the query string pairs.
    pub fn set_query(&mut self, query: IndexMap<String, String>) {
        self.query = query;
    }

    /// Returns the decoded request body.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Sets the decoded request body.
    pub fn set_body(&mut self, body: Option<Value>) {
        self.body = body;
    }

    /// Returns the merged request data used for parameter binding.
    #[must_use]
    pub fn request_data(&self) -> &Map<String, Value> {
        &self.request_data
    }

    /// Replaces the merged request data.
    pub fn set_request_data(&mut self, data: Map<String, Value>) {
        self.request_data = data;
    }

    /// Returns the requested API version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Sets the requested API version.
    pub fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    /// Returns the per-request settings snapshot.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns a mutable reference to the settings snapshot.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Returns the matched route.
    #[must_use]
    pub fn route(&self) -> Option<&Route> {
        self.route.as_deref()
    }

    /// Records the matched route and applies its request-time overrides to
    /// the settings snapshot.
    pub fn set_route(&mut self, route: Arc<Route>) {
        self.settings.apply_route_overrides(&route.metadata);
        self.route = Some(route);
    }

    /// Returns the resolved parameters in signature order.
    #[must_use]
    pub fn parameters(&self) -> &[ResolvedParameter] {
        &self.parameters
    }

    /// Returns a mutable reference to the resolved parameters.
    pub fn parameters_mut(&mut self) -> &mut Vec<ResolvedParameter> {
        &mut self.parameters
    }

    /// Returns the resolved parameter named `name`.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ResolvedParameter> {
        self.parameters.iter().find(|p| p.descriptor.name == name)
    }

    /// Returns the path segments captured by a wildcard route.
    #[must_use]
    pub fn wildcard_args(&self) -> &[String] {
        &self.wildcard_args
    }

    /// Sets the wildcard segments.
    pub fn set_wildcard_args(&mut self, args: Vec<String>) {
        self.wildcard_args = args;
    }

    /// Returns the authentication outcome.
    #[must_use]
    pub fn auth(&self) -> &AuthOutcome {
        &self.auth
    }

    /// Sets the authentication outcome.
    pub fn set_auth(&mut self, auth: AuthOutcome) {
        self.auth = auth;
    }

    /// Returns true if an authenticator accepted the request.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Returns the identity an authenticator attached, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Attaches the caller identity. Called by authenticators.
    pub fn set_identity(&mut self, identity: impl Into<String>) {
        self.identity = Some(identity.into());
    }

    /// Returns the negotiated response format.
    #[must_use]
    pub fn format(&self) -> Option<&NegotiatedFormat> {
        self.format.as_ref()
    }

    /// Sets the negotiated response format.
    pub fn set_format(&mut self, format: NegotiatedFormat) {
        self.format = Some(format);
    }

    /// Returns the media type the request body was decoded with.
    #[must_use]
    pub fn request_format(&self) -> Option<&str> {
        self.request_format.as_deref()
    }

    /// Sets the request body media type.
    pub fn set_request_format(&mut self, mime: impl Into<String>) {
        self.request_format = Some(mime.into());
    }

    /// Returns the negotiated charset.
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Sets the negotiated charset.
    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = charset.into();
    }

    /// Returns the negotiated language.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Sets the negotiated language.
    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
    }

    /// Returns true if the response format was chosen from `Accept`.
    #[must_use]
    pub fn vary_accept(&self) -> bool {
        self.vary_accept
    }

    /// Marks the response as varying on `Accept`.
    pub fn set_vary_accept(&mut self, vary: bool) {
        self.vary_accept = vary;
    }

    /// Returns the headers to add to the response.
    #[must_use]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Adds a response header, replacing any previous value.
    ///
    /// Invalid names or values are ignored.
    pub fn set_response_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.response_headers.insert(name, value);
        }
    }

    /// Returns the response status chosen so far.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Sets the response status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Returns the current lifecycle stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Advances the lifecycle stage.
    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Returns the time elapsed since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{AccessLevel, RouteMetadata, Target};

    #[test]
    fn test_request_id_display_is_uuid() {
        let id = RequestId::new();
        assert_eq!(id.to_string().len(), 36);
    }

    #[test]
    fn test_new_context_defaults() {
        let ctx = RequestContext::new(HttpMethod::Post, "  /authors/ ", Settings::default());
        assert_eq!(ctx.path(), "authors/");
        assert_eq!(ctx.raw_path(), "  /authors/ ");
        assert_eq!(ctx.version(), 1);
        assert_eq!(ctx.charset(), "utf-8");
        assert_eq!(ctx.language(), "en");
        assert_eq!(ctx.auth(), &AuthOutcome::NotRequired);
        assert!(!ctx.is_authenticated());
        assert!(ctx.status().is_none());
    }

    #[test]
    fn test_set_route_applies_overrides_to_snapshot() {
        let mut ctx = RequestContext::new(HttpMethod::Get, "/a", Settings::default());
        let route = Route {
            url_template: "a".to_string(),
            http_method: HttpMethod::Get,
            target: Target::new("A", "get"),
            parameters: Vec::new(),
            access_level: AccessLevel::Public,
            auth_classes: Vec::new(),
            request_media_types: Vec::new(),
            response_media_types: Vec::new(),
            api_version: 1,
            wildcard: false,
            metadata: RouteMetadata {
                expires: Some(30),
                ..RouteMetadata::default()
            },
        };
        ctx.set_route(Arc::new(route));
        assert_eq!(ctx.settings().response.expires, 30);
        assert_eq!(ctx.route().map(|r| r.url_template.as_str()), Some("a"));
    }

    #[test]
    fn test_response_header_ignores_invalid() {
        let mut ctx = RequestContext::new(HttpMethod::Get, "/", Settings::default());
        ctx.set_response_header("X-Ok", "1");
        ctx.set_response_header("bad header", "1");
        assert_eq!(ctx.response_headers().len(), 1);
        assert_eq!(ctx.response_headers()["x-ok"], "1");
    }

    #[test]
    fn test_auth_outcomes_are_distinct() {
        assert!(AuthOutcome::Authenticated { by: "key".into() }.is_authenticated());
        assert!(!AuthOutcome::Rejected.is_authenticated());
        assert_ne!(AuthOutcome::Rejected, AuthOutcome::NoAuthenticator);
    }

    #[test]
    fn test_stage_order() {
        let stages = Stage::all();
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
        assert!(Stage::Errored.is_terminal());
        assert!(!Stage::Validated.is_terminal());
        assert_eq!(Stage::PreFiltered.to_string(), "pre_filtered");
    }

    #[test]
    fn test_negotiated_content_type_prefers_vendor() {
        let mut format = NegotiatedFormat::new("application/json", "json");
        assert_eq!(format.content_type(), "application/json");
        format.vendor_mime = Some("application/vnd.acme-v2+json".to_string());
        assert_eq!(format.content_type(), "application/vnd.acme-v2+json");
    }
}
