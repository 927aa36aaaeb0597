//! The request lifecycle dispatcher.
//!
//! ## Stages
//!
//! Every request walks the same fixed sequence. Any stage may fail; the
//! failure skips straight to error composition.
//!
//! 1. **Routing** - the matcher resolves the route and binds parameters
//! 2. **Negotiation** - response format, charset and language
//! 3. **Pre-auth filters** - filters that do not need the auth outcome
//! 4. **Authentication** - when the effective access level requires it
//! 5. **Post-auth filters** - filters that need the auth outcome
//! 6. **Validation** - per-parameter coercion and constraint checks
//! 7. **Invocation** - the resource method runs
//! 8. **Composition** - the result is wrapped by the [`Compose`] envelope
//! 9. **Response** - encoding, headers, status
//!
//! Before routing, the path is normalised: a `v{N}` segment selects the API
//! version when URL versioning is on, a known format extension is stripped
//! and remembered, and the request body and query string are decoded.

use crate::auth::authenticate;
use crate::compose::DefaultCompose;
use crate::cors;
use crate::filters::run_filters;
use crate::format::{collect_pairs, essence, FormatRegistry, JsonFormat};
use crate::negotiate::{negotiate, requested_version};
use crate::response;
use crate::validator::DefaultValidator;
use bytes::Bytes;
use hermes_core::{
    AccessLevel, ApiError, ApiResult, Authenticator, CacheStore, CallAccess, Compose, DebugInfo,
    Filter, Format, HttpMethod, Invocation, NegotiatedFormat, RegistrationError, Reply,
    RequestContext, ResolvedParameter, Resource, Response, Settings, Stage, Validator,
};
use hermes_router::{RouteMatcher, RouteTable, RouteTableBuilder};
use hermes_telemetry::{record_rejection, record_request, InFlightGuard};
use http::header::HeaderName;
use http::{HeaderMap, HeaderValue, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Dispatches requests to registered resources.
///
/// Built once with [`Dispatcher::builder`]; afterwards it is immutable and
/// can serve any number of concurrent requests.
///
/// # Example
///
/// ```no_run
/// use bytes::Bytes;
/// use hermes_core::Settings;
/// use hermes_dispatch::Dispatcher;
/// # use hermes_core::{signature::ResourceSignature, ApiResult, BoxFuture, Invocation, Reply, Resource};
/// # use std::sync::Arc;
/// # struct Authors;
/// # impl Resource for Authors {
/// #     fn signature(&self) -> ResourceSignature { ResourceSignature::new("Authors") }
/// #     fn call<'a>(&'a self, _: Invocation<'a>) -> BoxFuture<'a, ApiResult<Reply>> {
/// #         Box::pin(async { Ok(serde_json::Value::Null.into()) })
/// #     }
/// # }
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let dispatcher = Dispatcher::builder(Settings::default())
///     .resource(None, Arc::new(Authors))
///     .build()?;
///
/// let request = http::Request::get("/authors/42").body(Bytes::new())?;
/// let response = dispatcher.dispatch(request).await;
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    settings: Settings,
    table: RouteTable,
    matcher: RouteMatcher,
    resources: HashMap<String, Arc<dyn Resource>>,
    formats: FormatRegistry,
    authenticators: Vec<Arc<dyn Authenticator>>,
    filters: Vec<Arc<dyn Filter>>,
    validator: Arc<dyn Validator>,
    compose: Arc<dyn Compose>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.len())
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("formats", &self.formats)
            .field("authenticators", &self.authenticators.len())
            .field("filters", &self.filters.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Starts building a dispatcher with process-wide `settings`.
    #[must_use]
    pub fn builder(settings: Settings) -> DispatcherBuilder {
        DispatcherBuilder::new(settings)
    }

    /// The route table built at registration.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    /// The process-wide settings each request starts from.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one request through the lifecycle.
    ///
    /// Never fails: errors become composed error responses.
    pub async fn dispatch(&self, request: http::Request<Bytes>) -> Response {
        let _in_flight = InFlightGuard::new();
        let (parts, body) = request.into_parts();
        let method = HttpMethod::try_from(&parts.method);
        let mut ctx = RequestContext::new(
            method.clone().unwrap_or(HttpMethod::Get),
            parts.uri.path(),
            self.settings.clone(),
        );
        *ctx.headers_mut() = parts.headers;

        let span = tracing::info_span!(
            "dispatch",
            request_id = %ctx.request_id(),
            http.method = %parts.method,
            http.path = %parts.uri.path(),
        );

        let mut extension = None;
        let outcome = match method {
            Ok(_) => {
                self.run(&mut ctx, parts.uri.query(), &body, &mut extension)
                    .instrument(span.clone())
                    .await
            }
            Err(reason) => Err(ApiError::status(501, reason)),
        };
        let response = match outcome {
            Ok(response) => response,
            Err(error) => span.in_scope(|| self.fail(&mut ctx, error, extension.as_deref())),
        };

        let throttle = Duration::from_millis(ctx.settings().response.throttle_ms);
        let elapsed = ctx.elapsed();
        if throttle > elapsed {
            tokio::time::sleep(throttle - elapsed).await;
        }

        let status = response.status().as_u16();
        let duration = ctx.elapsed();
        span.in_scope(|| {
            tracing::info!(
                http.status_code = status,
                duration_ms = duration.as_millis() as u64,
                "request completed"
            );
        });
        record_request(parts.method.as_str(), status, duration);
        response
    }

    async fn run(
        &self,
        ctx: &mut RequestContext,
        query: Option<&str>,
        body: &Bytes,
        extension: &mut Option<String>,
    ) -> ApiResult<Response> {
        self.prepare_path(ctx, extension);
        tracing::debug!(path = ctx.path(), version = ctx.version(), "request started");

        if ctx.settings().cors.enabled && cors::is_preflight(ctx.method(), ctx.headers()) {
            let mut headers = HeaderMap::new();
            cors::apply(&ctx.settings().cors, ctx.headers(), &mut headers, true);
            ctx.set_stage(Stage::Responded);
            return Ok(response::assemble(ctx, StatusCode::OK, Bytes::new(), headers));
        }

        self.read_request(ctx, query, body)?;

        let found = self.matcher.find(ctx.path(), ctx.method(), ctx.version())?;
        ctx.set_route(Arc::clone(&found.route));
        ctx.set_wildcard_args(found.wildcard_args.clone());
        let parameters = found.bind(ctx.request_data(), ctx.headers(), &ctx.settings().routing);
        *ctx.parameters_mut() = parameters;
        self.check_request_format(ctx)?;
        ctx.set_stage(Stage::Routed);

        negotiate(ctx, &self.formats, extension.as_deref())?;
        ctx.set_stage(Stage::Negotiated);

        run_filters(ctx, &self.filters, false).await?;
        ctx.set_stage(Stage::PreFiltered);

        authenticate(ctx, &self.authenticators).await?;
        ctx.set_stage(Stage::Authenticated);

        run_filters(ctx, &self.filters, true).await?;
        ctx.set_stage(Stage::PostFiltered);

        self.validate(ctx)?;
        ctx.set_stage(Stage::Validated);

        let reply = self.invoke(ctx).await?;
        ctx.set_stage(Stage::Invoked);

        let response = match reply {
            Reply::Response(response) => with_route_headers(ctx, response),
            Reply::Value(value) => {
                let composed = self.compose.response(value);
                ctx.set_stage(Stage::Composed);
                self.respond(ctx, &composed)?
            }
        };
        ctx.set_stage(Stage::Responded);
        Ok(response)
    }

    /// Strips the version segment and format extension from the path and
    /// picks the API version.
    fn prepare_path(&self, ctx: &mut RequestContext, extension: &mut Option<String>) {
        let mut path = ctx.path().to_string();
        let mut version = None;
        if ctx.settings().api.use_url_based_versioning {
            if let Some((v, rest)) = split_version(&path) {
                version = Some(v);
                path = rest.to_string();
            }
        }
        if let Some((stem, ext)) = path.rsplit_once('.') {
            if !ext.contains('/') && self.formats.by_extension(ext).is_some() {
                *extension = Some(ext.to_ascii_lowercase());
                path = stem.to_string();
            }
        }
        ctx.set_path(path);
        if let Some(version) = version.or_else(|| requested_version(ctx)) {
            ctx.set_version(version);
        }
    }

    /// Decodes the query string and body into the context.
    fn read_request(
        &self,
        ctx: &mut RequestContext,
        query: Option<&str>,
        body: &Bytes,
    ) -> ApiResult<()> {
        let pairs: Vec<(String, String)> = match query.filter(|q| !q.is_empty()) {
            Some(q) => serde_urlencoded::from_str(q)
                .map_err(|e| ApiError::bad_request(format!("Error parsing query string: {e}")))?,
            None => Vec::new(),
        };
        let query: IndexMap<String, String> = pairs.iter().cloned().collect();

        let decoded = if body.is_empty() {
            None
        } else {
            let format = self.request_format(ctx)?;
            let value = format.decode(body)?;
            ctx.set_request_format(format.mime());
            Some(value)
        };

        let mut data = collect_pairs(pairs);
        if let Some(Value::Object(fields)) = &decoded {
            data.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let full = decoded
            .clone()
            .unwrap_or_else(|| Value::Object(data.clone()));
        data.insert(ctx.settings().routing.full_request_data_name.clone(), full);

        ctx.set_query(query);
        ctx.set_body(decoded);
        ctx.set_request_data(data);
        Ok(())
    }

    /// The format for the request body, chosen by `Content-Type`.
    fn request_format(&self, ctx: &RequestContext) -> ApiResult<&Arc<dyn Format>> {
        let status = ctx.settings().negotiation.unsupported_media_type_status;
        match ctx.header(http::header::CONTENT_TYPE.as_str()) {
            Some(content_type) => self.formats.by_mime(content_type).ok_or_else(|| {
                ApiError::unsupported_media_type(
                    format!("Content type `{}` is not supported.", essence(content_type)),
                    status,
                )
            }),
            None => self
                .formats
                .default_format()
                .ok_or_else(|| ApiError::unsupported_media_type("No format is registered.", status)),
        }
    }

    /// Rejects a body whose format the route does not accept.
    fn check_request_format(&self, ctx: &RequestContext) -> ApiResult<()> {
        let (Some(route), Some(mime)) = (ctx.route(), ctx.request_format()) else {
            return Ok(());
        };
        if route.request_media_types.is_empty()
            || route
                .request_media_types
                .iter()
                .any(|m| m.eq_ignore_ascii_case(mime))
        {
            return Ok(());
        }
        Err(ApiError::unsupported_media_type(
            format!("Content type `{mime}` is not supported."),
            ctx.settings().negotiation.unsupported_media_type_status,
        ))
    }

    /// Replaces raw values with validated ones.
    ///
    /// A missing required parameter fails. An optional parameter that fails
    /// validation is treated as absent.
    fn validate(&self, ctx: &mut RequestContext) -> ApiResult<()> {
        let auto = ctx.settings().response.auto_validation;
        for param in ctx.parameters_mut() {
            let descriptor = &param.descriptor;
            let Some(raw) = param.value.take() else {
                if descriptor.required && descriptor.default.is_none() {
                    return Err(ApiError::invalid_parameter(
                        &descriptor.name,
                        format!("`{}` is required.", descriptor.name),
                    ));
                }
                continue;
            };
            if !auto || !descriptor.validate {
                param.value = Some(raw);
                continue;
            }
            match self.validator.validate(raw, descriptor) {
                Ok(value) => param.value = Some(value),
                Err(err) if descriptor.required => return Err(err),
                Err(err) => {
                    tracing::debug!(param = %descriptor.name, error = %err, "optional parameter dropped");
                    param.value = None;
                }
            }
        }
        Ok(())
    }

    async fn invoke(&self, ctx: &RequestContext) -> ApiResult<Reply> {
        let route = ctx
            .route()
            .ok_or_else(|| ApiError::internal("no route was matched"))?;
        let resource = self.resources.get(&route.target.class_name).ok_or_else(|| {
            ApiError::internal(format!("`{}` is not registered", route.target.class_name))
        })?;

        let mut parameters: Vec<&ResolvedParameter> = ctx.parameters().iter().collect();
        parameters.sort_by_key(|p| p.descriptor.index);
        let args = parameters.iter().map(|p| p.value_or_default()).collect();
        let access = if route.access_level == AccessLevel::ProtectedByVisibility {
            CallAccess::Override
        } else {
            CallAccess::Normal
        };

        tracing::debug!(route = %route.target, "invoking");
        resource
            .call(Invocation::new(&route.target.method_name, args, ctx, access))
            .await
    }

    fn respond(&self, ctx: &RequestContext, value: &Value) -> ApiResult<Response> {
        let status = ctx
            .route()
            .and_then(|r| r.metadata.status)
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK);
        let body = if value.is_null() && ctx.settings().response.empty_body_for_null {
            Bytes::new()
        } else {
            self.encode(ctx, value)?
        };

        Ok(response::assemble(ctx, status, body, route_headers(ctx)))
    }

    fn encode(&self, ctx: &RequestContext, value: &Value) -> ApiResult<Bytes> {
        let format = ctx
            .format()
            .and_then(|f| self.formats.by_mime(&f.mime))
            .or_else(|| self.formats.default_format())
            .ok_or_else(|| ApiError::internal("no format is registered"))?;
        format.encode(value, ctx.settings().api.debug)
    }

    /// Turns a stage failure into the error response.
    fn fail(&self, ctx: &mut RequestContext, error: ApiError, extension: Option<&str>) -> Response {
        let stage = failing_stage(ctx.stage());
        ctx.set_stage(Stage::Errored);
        let status = error.status_code();
        if error.is_server_error() {
            tracing::error!(stage = stage.name(), error = %error, "request failed");
        } else {
            tracing::warn!(stage = stage.name(), error = %error, "request rejected");
        }
        record_rejection(stage.name(), status.as_u16());

        if ctx.format().is_none()
            && negotiate(ctx, &self.formats, extension).is_err()
            && ctx.format().is_none()
        {
            if let Some(format) = self.formats.default_format() {
                ctx.set_format(NegotiatedFormat::new(format.mime(), format.extension()));
            }
        }

        let debug = ctx.settings().api.debug.then(|| DebugInfo {
            stage: stage.name().to_string(),
            source: ctx.route().map(|r| r.target.to_string()),
            cause: error.cause_chain(),
        });
        let body = self.compose.message(&error, debug);

        let mut extra = HeaderMap::new();
        response::error_headers(&mut extra, &error);
        cors::apply(&ctx.settings().cors, ctx.headers(), &mut extra, false);
        match self.encode(ctx, &body) {
            Ok(bytes) => response::assemble(ctx, status, bytes, extra),
            Err(secondary) => {
                tracing::error!(error = %secondary, "failed to encode error response");
                response::fallback(status, &error.error_message())
            }
        }
    }
}

/// The route's `@header` lines plus the CORS headers for this request.
fn route_headers(ctx: &RequestContext) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(route) = ctx.route() {
        for (name, value) in &route.metadata.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
    }
    cors::apply(&ctx.settings().cors, ctx.headers(), &mut headers, false);
    headers
}

/// Adds route and CORS headers to a response the method built itself.
/// Headers the method already set are kept.
fn with_route_headers(ctx: &RequestContext, mut response: Response) -> Response {
    let headers = response.headers_mut();
    for (name, value) in route_headers(ctx) {
        if let Some(name) = name {
            headers.entry(name).or_insert(value);
        }
    }
    response
}

/// The stage that was running when a request at `reached` failed.
fn failing_stage(reached: Stage) -> Stage {
    Stage::all()
        .into_iter()
        .find(|stage| *stage > reached)
        .unwrap_or(Stage::Errored)
}

/// Splits a leading `v{N}` segment off `path`.
fn split_version(path: &str) -> Option<(u32, &str)> {
    let (head, rest) = path.split_once('/').unwrap_or((path, ""));
    let digits = head.strip_prefix(|c| c == 'v' || c == 'V')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, rest))
}

/// Collects resources and collaborators for a [`Dispatcher`].
pub struct DispatcherBuilder {
    settings: Settings,
    resources: Vec<(Option<String>, Arc<dyn Resource>)>,
    formats: FormatRegistry,
    authenticators: Vec<Arc<dyn Authenticator>>,
    filters: Vec<Arc<dyn Filter>>,
    validator: Arc<dyn Validator>,
    compose: Arc<dyn Compose>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("resources", &self.resources.len())
            .field("formats", &self.formats)
            .field("authenticators", &self.authenticators.len())
            .field("filters", &self.filters.len())
            .finish_non_exhaustive()
    }
}

impl DispatcherBuilder {
    /// Creates a builder with the default validator and envelope.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            resources: Vec::new(),
            formats: FormatRegistry::new(),
            authenticators: Vec::new(),
            filters: Vec::new(),
            validator: Arc::new(DefaultValidator),
            compose: Arc::new(DefaultCompose),
            cache: None,
        }
    }

    /// Registers a resource under `prefix`, or under its lower-cased class
    /// name when `prefix` is `None`.
    #[must_use]
    pub fn resource(mut self, prefix: Option<&str>, resource: Arc<dyn Resource>) -> Self {
        self.resources.push((prefix.map(ToString::to_string), resource));
        self
    }

    /// Registers a format. The first one registered is the default; JSON is
    /// used when none is.
    #[must_use]
    pub fn format(mut self, format: Arc<dyn Format>) -> Self {
        self.formats.register(format);
        self
    }

    /// Registers an authenticator.
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticators.push(authenticator);
        self
    }

    /// Registers a filter.
    #[must_use]
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Replaces the parameter validator.
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Replaces the response envelope.
    #[must_use]
    pub fn compose(mut self, compose: Arc<dyn Compose>) -> Self {
        self.compose = compose;
        self
    }

    /// Persists the route table in `cache` when route caching is enabled.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the route table and the matcher.
    pub fn build(mut self) -> Result<Dispatcher, RegistrationError> {
        if self.formats.is_empty() {
            self.formats.register(Arc::new(JsonFormat));
        }

        let mut routes = RouteTableBuilder::new(&self.settings);
        let mut resources = HashMap::new();
        for (prefix, resource) in &self.resources {
            let signature = resource.signature();
            resources.insert(signature.name.clone(), Arc::clone(resource));
            routes.add_resource(prefix.as_deref(), signature);
        }
        for authenticator in &self.authenticators {
            routes = routes.authenticator(Arc::clone(authenticator));
        }
        if let Some(cache) = &self.cache {
            routes = routes.cache(Arc::clone(cache));
        }
        let table = routes.build()?;
        let matcher = RouteMatcher::new(&table)?;

        Ok(Dispatcher {
            settings: self.settings,
            table,
            matcher,
            resources,
            formats: self.formats,
            authenticators: self.authenticators,
            filters: self.filters,
            validator: self.validator,
            compose: self.compose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use hermes_core::signature::{MethodSignature, ParamSignature, ResourceSignature};
    use hermes_core::{AuthOutcome, BoxFuture};
    use http_body_util::{BodyExt, Full};
    use serde_json::json;

    struct Authors;

    impl Resource for Authors {
        fn signature(&self) -> ResourceSignature {
            ResourceSignature::new("Authors")
                .method(
                    MethodSignature::new("get")
                        .param(ParamSignature::new("id").typed("int")),
                )
                .method(
                    MethodSignature::new("post")
                        .doc("@status 201")
                        .param(ParamSignature::new("name").typed("string"))
                        .param(
                            ParamSignature::new("age")
                                .typed("int")
                                .default_value(18),
                        ),
                )
                .method(MethodSignature::new("delete").param(ParamSignature::new("id").typed("int")))
                .method(
                    MethodSignature::new("getSecret")
                        .doc("@access hybrid")
                        .returns("string"),
                )
                .method(MethodSignature::new("getRaw").doc("@header X-Api: authors"))
        }

        fn call<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, ApiResult<Reply>> {
            Box::pin(async move {
                match invocation.method() {
                    "get" => Ok(json!({ "id": invocation.arg::<i64>(0)? }).into()),
                    "post" => Ok(json!({
                        "name": invocation.arg::<String>(0)?,
                        "age": invocation.arg::<i64>(1)?,
                    })
                    .into()),
                    "delete" => Ok(Value::Null.into()),
                    "getRaw" => Ok(http::Response::builder()
                        .status(StatusCode::ACCEPTED)
                        .header("x-api", "raw")
                        .body(Full::new(Bytes::from_static(b"raw")))
                        .map_err(|e| ApiError::internal_with_source("bad response", e))?
                        .into()),
                    "getSecret" => Ok(json!({
                        "authenticated": invocation.is_authenticated(),
                        "outcome": format!("{:?}", invocation.auth()),
                    })
                    .into()),
                    other => Err(ApiError::internal(format!("unexpected `{other}`"))),
                }
            })
        }
    }

    fn dispatcher(settings: Settings) -> Dispatcher {
        Dispatcher::builder(settings)
            .resource(None, Arc::new(Authors))
            .build()
            .unwrap()
    }

    fn get(uri: &str) -> http::Request<Bytes> {
        http::Request::get(uri).body(Bytes::new()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let response = dispatcher(Settings::default()).dispatch(get("/authors/42")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[http::header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        assert_eq!(response.headers()[http::header::EXPIRES], "0");
        assert_eq!(body_json(response).await, json!({"id": 42}));
    }

    #[tokio::test]
    async fn test_post_body_with_status() {
        let request = http::Request::post("/authors")
            .header("content-type", "application/json")
            .body(Bytes::from_static(br#"{"name": "Ann"}"#))
            .unwrap();
        let response = dispatcher(Settings::default()).dispatch(request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, json!({"name": "Ann", "age": 18}));
    }

    #[tokio::test]
    async fn test_unsupported_body_format() {
        let request = http::Request::post("/authors")
            .header("content-type", "text/csv")
            .body(Bytes::from_static(b"name\nAnn"))
            .unwrap();
        let response = dispatcher(Settings::default()).dispatch(request).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body = body_json(response).await;
        assert_eq!(
            body["error"]["message"],
            "Unsupported Media Type: Content type `text/csv` is not supported."
        );
    }

    #[tokio::test]
    async fn test_invalid_required_value_is_bad_request() {
        let request = http::Request::post("/authors")
            .header("content-type", "application/json")
            .body(Bytes::from_static(br#"{"name": {"first": "Ann"}, "age": "old"}"#))
            .unwrap();
        let response = dispatcher(Settings::default()).dispatch(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "Bad Request: Invalid value specified for `Name`. Expecting string value"
        );
    }

    #[tokio::test]
    async fn test_invalid_optional_value_falls_back_to_default() {
        let request = http::Request::post("/authors")
            .header("content-type", "application/json")
            .body(Bytes::from_static(br#"{"name": "Ann", "age": "old"}"#))
            .unwrap();
        let response = dispatcher(Settings::default()).dispatch(request).await;
        assert_eq!(body_json(response).await, json!({"name": "Ann", "age": 18}));
    }

    #[tokio::test]
    async fn test_null_result_has_empty_body() {
        let request = http::Request::delete("/authors/3").body(Bytes::new()).unwrap();
        let response = dispatcher(Settings::default()).dispatch(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(http::header::CONTENT_TYPE));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_route_without_authenticator() {
        let response = dispatcher(Settings::default()).dispatch(get("/authors/secret")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["authenticated"], false);
        assert_eq!(body["outcome"], format!("{:?}", AuthOutcome::NoAuthenticator));
    }

    #[tokio::test]
    async fn test_url_versioning_and_extension() {
        let mut settings = Settings::default();
        settings.api.use_url_based_versioning = true;
        settings.api.max_version = 2;
        let dispatcher = dispatcher(settings);

        let response = dispatcher.dispatch(get("/v2/authors/7.json")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"id": 7}));

        let response = dispatcher.dispatch(get("/v3/authors/7")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "Not Found: Version 3 is not supported"
        );
    }

    #[tokio::test]
    async fn test_head_uses_get_route_without_body() {
        let request = http::Request::head("/authors/5").body(Bytes::new()).unwrap();
        let response = dispatcher(Settings::default()).dispatch(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_preflight_short_circuits() {
        let mut settings = Settings::default();
        settings.cors.enabled = true;
        let request = http::Request::options("/anything/at/all")
            .header("origin", "https://app.example")
            .header("access-control-request-method", "PUT")
            .body(Bytes::new())
            .unwrap();
        let response = dispatcher(settings).dispatch(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[http::header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example"
        );
    }

    #[tokio::test]
    async fn test_prebuilt_response_gets_cors_headers() {
        let mut settings = Settings::default();
        settings.cors.enabled = true;
        let request = http::Request::get("/authors/raw")
            .header("origin", "https://app.example")
            .body(Bytes::new())
            .unwrap();
        let response = dispatcher(settings).dispatch(request).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.headers()[http::header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example"
        );
        assert_eq!(response.headers()["x-api"], "raw");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"raw");
    }

    #[tokio::test]
    async fn test_debug_info_on_errors() {
        let mut settings = Settings::default();
        settings.api.debug = true;
        let response = dispatcher(settings).dispatch(get("/authors/x/y/z")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["debug"]["stage"], "routed");
    }

    #[tokio::test]
    async fn test_unknown_http_method() {
        let request = http::Request::builder()
            .method("TRACE")
            .uri("/authors")
            .body(Bytes::new())
            .unwrap();
        let response = dispatcher(Settings::default()).dispatch(request).await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_delays_response() {
        let mut settings = Settings::default();
        settings.response.throttle_ms = 500;
        let dispatcher = dispatcher(settings);
        let started = tokio::time::Instant::now();
        let response = dispatcher.dispatch(get("/authors/1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[test]
    fn test_route_cache_roundtrip() {
        let cache = Arc::new(MemoryCache::new());
        let mut settings = Settings::default();
        settings.routing.cache_routes = true;
        let first = Dispatcher::builder(settings.clone())
            .resource(None, Arc::new(Authors))
            .cache(cache.clone())
            .build()
            .unwrap();
        assert!(!cache.is_empty());
        let second = Dispatcher::builder(settings)
            .resource(None, Arc::new(Authors))
            .cache(cache)
            .build()
            .unwrap();
        assert_eq!(first.routes(), second.routes());
        assert!(first.routes().get(1, "authors/raw", HttpMethod::Get).is_some());
    }

    #[test]
    fn test_split_version() {
        assert_eq!(split_version("v2/authors"), Some((2, "authors")));
        assert_eq!(split_version("V10"), Some((10, "")));
        assert_eq!(split_version("video/1"), None);
        assert_eq!(split_version("v/1"), None);
    }

    #[test]
    fn test_failing_stage() {
        assert_eq!(failing_stage(Stage::Start), Stage::Routed);
        assert_eq!(failing_stage(Stage::Authenticated), Stage::PostFiltered);
        assert_eq!(failing_stage(Stage::Responded), Stage::Errored);
    }
}
