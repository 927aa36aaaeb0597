//! Cross-origin headers.
//!
//! Only requests carrying an `Origin` header get CORS headers. A preflight
//! (`OPTIONS` with `Access-Control-Request-Method`) is answered before
//! routing with an empty 200.

use hermes_core::{CorsSettings, HttpMethod};
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
    ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
};
use http::{HeaderMap, HeaderValue};

/// Returns true for a CORS preflight request.
pub(crate) fn is_preflight(method: HttpMethod, request: &HeaderMap) -> bool {
    method == HttpMethod::Options
        && request.contains_key(ORIGIN)
        && request.contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

/// Adds the CORS headers for `request` to `response`.
///
/// A configured origin of `*` echoes the request origin so that
/// credentials can be allowed.
pub(crate) fn apply(
    cors: &CorsSettings,
    request: &HeaderMap,
    response: &mut HeaderMap,
    preflight: bool,
) {
    if !cors.enabled {
        return;
    }
    let Some(origin) = request.get(ORIGIN) else {
        return;
    };
    let allow_origin = if cors.allow_origin == "*" {
        Some(origin.clone())
    } else {
        HeaderValue::from_str(&cors.allow_origin).ok()
    };
    if let Some(allow_origin) = allow_origin {
        response.insert(ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
    }
    response.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );

    if !preflight {
        return;
    }
    if let Ok(methods) = HeaderValue::from_str(&cors.allow_methods) {
        response.insert(ACCESS_CONTROL_ALLOW_METHODS, methods);
    }
    if let Some(requested) = request.get(ACCESS_CONTROL_REQUEST_HEADERS) {
        response.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }
    response.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(cors.max_age_secs));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> CorsSettings {
        CorsSettings {
            enabled: true,
            ..CorsSettings::default()
        }
    }

    fn preflight_request() -> HeaderMap {
        let mut request = HeaderMap::new();
        request.insert(ORIGIN, HeaderValue::from_static("https://app.example"));
        request.insert(ACCESS_CONTROL_REQUEST_METHOD, HeaderValue::from_static("PUT"));
        request.insert(ACCESS_CONTROL_REQUEST_HEADERS, HeaderValue::from_static("x-token"));
        request
    }

    #[test]
    fn test_preflight_detection() {
        let request = preflight_request();
        assert!(is_preflight(HttpMethod::Options, &request));
        assert!(!is_preflight(HttpMethod::Get, &request));
        assert!(!is_preflight(HttpMethod::Options, &HeaderMap::new()));
    }

    #[test]
    fn test_preflight_headers() {
        let mut response = HeaderMap::new();
        apply(&enabled(), &preflight_request(), &mut response, true);
        assert_eq!(response[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(response[ACCESS_CONTROL_ALLOW_HEADERS], "x-token");
        assert_eq!(response[ACCESS_CONTROL_MAX_AGE], "86400");
        assert!(response.contains_key(ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[test]
    fn test_simple_request_and_disabled() {
        let mut settings = enabled();
        settings.allow_origin = "https://fixed.example".to_string();
        let mut response = HeaderMap::new();
        apply(&settings, &preflight_request(), &mut response, false);
        assert_eq!(response[ACCESS_CONTROL_ALLOW_ORIGIN], "https://fixed.example");
        assert!(!response.contains_key(ACCESS_CONTROL_MAX_AGE));

        let mut response = HeaderMap::new();
        apply(&CorsSettings::default(), &preflight_request(), &mut response, true);
        assert!(response.is_empty());
    }
}
