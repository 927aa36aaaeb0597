//! End-to-end request lifecycle tests.
//!
//! Each test builds a dispatcher the way an application would, from
//! configuration and resource classes, and sends plain `http` requests
//! through it.

use bytes::Bytes;
use hermes::core::signature::{MethodSignature, ParamSignature, ResourceSignature};
use hermes::dispatch::rate_limit_headers;
use hermes::prelude::*;
use http::header::{ALLOW, CONTENT_TYPE, RETRY_AFTER, WWW_AUTHENTICATE};
use http::StatusCode;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;

/// Echoes its bound arguments.
struct Echo;

impl Resource for Echo {
    fn signature(&self) -> ResourceSignature {
        ResourceSignature::new("Resource")
            .method(
                MethodSignature::new("get")
                    .doc("Fetches one item.\n@param int $id item id")
                    .param(ParamSignature::new("id").typed("int")),
            )
            .method(
                MethodSignature::new("getList")
                    .doc("@param int[] $ids item ids")
                    .param(ParamSignature::new("ids").typed("int[]")),
            )
    }

    fn call<'a>(&'a self, call: Invocation<'a>) -> BoxFuture<'a, ApiResult<Reply>> {
        Box::pin(async move { Ok(Value::Array(call.args().to_vec()).into()) })
    }
}

/// Paging with and without clamping.
struct Pages;

impl Resource for Pages {
    fn signature(&self) -> ResourceSignature {
        ResourceSignature::new("Pages")
            .method(
                MethodSignature::new("get")
                    .doc("@param int $count {@min 1} {@max 10} {@fix true}")
                    .param(ParamSignature::new("count").typed("int")),
            )
            .method(
                MethodSignature::new("getStrict")
                    .doc("@param int $count {@min 1} {@max 10}")
                    .param(ParamSignature::new("count").typed("int")),
            )
    }

    fn call<'a>(&'a self, call: Invocation<'a>) -> BoxFuture<'a, ApiResult<Reply>> {
        Box::pin(async move { Ok(json!({ "count": call.arg::<i64>(0)? }).into()) })
    }
}

/// One hybrid and one protected method.
struct Vault;

impl Resource for Vault {
    fn signature(&self) -> ResourceSignature {
        ResourceSignature::new("Vault")
            .method(MethodSignature::new("get").doc("@access hybrid"))
            .method(MethodSignature::new("getSecret").doc("@access protected"))
    }

    fn call<'a>(&'a self, call: Invocation<'a>) -> BoxFuture<'a, ApiResult<Reply>> {
        Box::pin(async move {
            Ok(json!({
                "method": call.method(),
                "authenticated": call.is_authenticated(),
                "rejected": matches!(call.auth(), AuthOutcome::Rejected),
            })
            .into())
        })
    }
}

/// Accepts requests carrying `X-Api-Key: letmein` and refuses revoked keys.
struct ApiKey;

impl Authenticator for ApiKey {
    fn name(&self) -> &str {
        "ApiKey"
    }

    fn is_allowed<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ApiResult<bool>> {
        Box::pin(async move {
            if ctx.header("x-api-key") == Some("revoked") {
                return Err(ApiError::invalid_credentials("key revoked"));
            }
            let allowed = ctx.header("x-api-key") == Some("letmein");
            if allowed {
                ctx.set_identity("key-holder");
            }
            Ok(allowed)
        })
    }

    fn www_authenticate(&self) -> String {
        "ApiKey realm=\"hermes\"".to_string()
    }
}

fn dispatcher() -> Dispatcher {
    let config = ConfigLoader::new().load().unwrap();
    Dispatcher::builder(config.settings())
        .resource(None, Arc::new(Echo))
        .resource(None, Arc::new(Pages))
        .resource(None, Arc::new(Vault))
        .authenticator(Arc::new(ApiKey))
        .build()
        .unwrap()
}

fn request(method: &str, uri: &str) -> http::request::Builder {
    http::Request::builder().method(method).uri(uri)
}

fn get(uri: &str) -> http::Request<Bytes> {
    request("GET", uri).body(Bytes::new()).unwrap()
}

async fn body_json(response: hermes::core::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_by_id_binds_path_argument() {
    let response = dispatcher().dispatch(get("/resource/42")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([42]));
}

#[tokio::test]
async fn required_id_without_path_segment_is_not_found() {
    let response = dispatcher().dispatch(get("/resource")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], 404);
}

#[tokio::test]
async fn numeric_placeholder_rejects_text() {
    let response = dispatcher().dispatch(get("/resource/abc")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn verb_mismatch_is_method_not_allowed() {
    let request = request("DELETE", "/resource/5").body(Bytes::new()).unwrap();
    let response = dispatcher().dispatch(request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[ALLOW], "GET");
}

#[tokio::test]
async fn repeated_query_keys_bind_as_list() {
    let response = dispatcher().dispatch(get("/resource/list?ids=1&ids=2")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([[1, 2]]));

    let response = dispatcher().dispatch(get("/resource/list?ids[]=3&ids[]=4")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([[3, 4]]));

    let response = dispatcher().dispatch(get("/resource/list?ids=5")).await;
    assert_eq!(body_json(response).await, json!([[5]]));
}

#[tokio::test]
async fn fix_clamps_out_of_range_values() {
    let response = dispatcher().dispatch(get("/pages?count=15")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"count": 10}));

    let response = dispatcher().dispatch(get("/pages?count=0")).await;
    assert_eq!(body_json(response).await, json!({"count": 1}));
}

#[tokio::test]
async fn without_fix_out_of_range_values_fail() {
    let response = dispatcher().dispatch(get("/pages/strict?count=15")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Bad Request: `Count` should be less than or equal to 10"
    );

    let response = dispatcher().dispatch(get("/pages/strict?count=7")).await;
    assert_eq!(body_json(response).await, json!({"count": 7}));
}

#[tokio::test]
async fn hybrid_access_proceeds_unauthenticated() {
    let request = request("GET", "/vault")
        .header("x-api-key", "wrong")
        .body(Bytes::new())
        .unwrap();
    let response = dispatcher().dispatch(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"method": "get", "authenticated": false, "rejected": true})
    );

    let request = crate::request("GET", "/vault")
        .header("x-api-key", "letmein")
        .body(Bytes::new())
        .unwrap();
    let body = body_json(dispatcher().dispatch(request).await).await;
    assert_eq!(body["authenticated"], true);
}

#[tokio::test]
async fn protected_access_requires_credentials() {
    let response = dispatcher().dispatch(get("/vault/secret")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[WWW_AUTHENTICATE], "ApiKey realm=\"hermes\"");

    let request = request("GET", "/vault/secret")
        .header("x-api-key", "letmein")
        .body(Bytes::new())
        .unwrap();
    let response = dispatcher().dispatch(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["method"], "getSecret");
}

#[tokio::test]
async fn invalid_credentials_still_send_challenge() {
    let request = request("GET", "/vault/secret")
        .header("x-api-key", "revoked")
        .body(Bytes::new())
        .unwrap();
    let response = dispatcher().dispatch(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[WWW_AUTHENTICATE], "ApiKey realm=\"hermes\"");
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Unauthorized: key revoked"
    );
}

#[tokio::test]
async fn wildcard_accept_falls_back_to_json() {
    let request = request("GET", "/resource/1")
        .header("accept", "application/xml;q=0.9, */*;q=0.1")
        .body(Bytes::new())
        .unwrap();
    let response = dispatcher().dispatch(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "application/json; charset=utf-8"
    );
    assert_eq!(response.headers()["vary"], "Accept");
}

#[tokio::test]
async fn unsatisfiable_accept_is_not_acceptable() {
    let request = request("GET", "/resource/1")
        .header("accept", "application/xml")
        .body(Bytes::new())
        .unwrap();
    let response = dispatcher().dispatch(request).await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn rate_limit_rejects_after_quota() {
    let limit = RateLimit::new(Arc::new(MemoryCache::new()))
        .unit(RateUnit::Minute)
        .limit(1);
    let dispatcher = Dispatcher::builder(Settings::default())
        .resource(None, Arc::new(Echo))
        .filter(Arc::new(limit))
        .build()
        .unwrap();

    let first = dispatcher.dispatch(get("/resource/1")).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()[rate_limit_headers::LIMIT], "1 per minute");
    assert_eq!(first.headers()[rate_limit_headers::REMAINING], "0");

    let second = dispatcher.dispatch(get("/resource/1")).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key(RETRY_AFTER));
}

#[tokio::test]
async fn url_versioning_from_configuration() {
    let config = ConfigLoader::new()
        .with_string(
            "[api]\nmax_version = 2\nuse_url_based_versioning = true\n",
            "toml",
        )
        .unwrap()
        .load()
        .unwrap();
    let dispatcher = Dispatcher::builder(config.settings())
        .resource(None, Arc::new(Echo))
        .build()
        .unwrap();

    let response = dispatcher.dispatch(get("/v2/resource/9")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([9]));

    let response = dispatcher.dispatch(get("/v3/resource/9")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
