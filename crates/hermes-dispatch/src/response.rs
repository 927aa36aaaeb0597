//! Response assembly.

use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hermes_core::{ApiError, HttpMethod, RequestContext, Response, ResponseSettings};
use http::header::{
    HeaderName, ALLOW, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, RETRY_AFTER, VARY, WWW_AUTHENTICATE,
};
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Ten years; later `Expires` dates are pointless.
const MAX_EXPIRES: u64 = 315_360_000;

/// Writes `Cache-Control` and `Expires`.
///
/// A positive `expires` makes the response cacheable for that many seconds;
/// otherwise the configured `Cache-Control` value is sent with `Expires: 0`.
pub(crate) fn cache_headers(headers: &mut HeaderMap, settings: &ResponseSettings, now: DateTime<Utc>) {
    let (cache_control, expires) = if settings.expires > 0 {
        let secs = i64::try_from(settings.expires.min(MAX_EXPIRES)).unwrap_or(0);
        let at = now
            .checked_add_signed(ChronoDuration::seconds(secs))
            .unwrap_or(now);
        (
            format!("max-age={}, must-revalidate", settings.expires),
            at.format(HTTP_DATE).to_string(),
        )
    } else {
        (settings.cache_control.clone(), "0".to_string())
    };
    insert(headers, CACHE_CONTROL, &cache_control);
    insert(headers, EXPIRES, &expires);
}

/// Headers that describe an error: `Allow`, `WWW-Authenticate`, `Retry-After`.
pub(crate) fn error_headers(headers: &mut HeaderMap, error: &ApiError) {
    if let Some(allowed) = error.allowed_methods() {
        let list: Vec<&str> = allowed.iter().map(|m| m.as_str()).collect();
        insert(headers, ALLOW, &list.join(", "));
    }
    if let Some(challenge) = error.www_authenticate() {
        insert(headers, WWW_AUTHENTICATE, challenge);
    }
    if let ApiError::TooManyRequests {
        retry_after_secs, ..
    } = error
    {
        headers.insert(RETRY_AFTER, HeaderValue::from(*retry_after_secs));
    }
}

/// Builds the final response from the context and an encoded body.
///
/// `Content-Type` is only set when there is a body; `HEAD` requests keep
/// their headers but lose the body.
pub(crate) fn assemble(ctx: &RequestContext, status: StatusCode, body: Bytes, extra: HeaderMap) -> Response {
    let mut headers = HeaderMap::new();
    cache_headers(&mut headers, &ctx.settings().response, Utc::now());
    if ctx.vary_accept() {
        headers.insert(VARY, HeaderValue::from_static("Accept"));
    }
    if !body.is_empty() {
        if let Some(format) = ctx.format() {
            insert(
                &mut headers,
                CONTENT_TYPE,
                &format!("{}; charset={}", format.content_type(), ctx.charset()),
            );
        }
    }
    for (name, value) in ctx.response_headers() {
        headers.insert(name.clone(), value.clone());
    }
    headers.extend(extra);

    let body = if ctx.method() == HttpMethod::Head {
        Bytes::new()
    } else {
        body
    };
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// A plain-text response used when the composed error cannot be encoded.
pub(crate) fn fallback(status: StatusCode, message: &str) -> Response {
    let mut response = Response::new(Full::new(Bytes::from(message.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
