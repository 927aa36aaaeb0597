//! Error types for Hermes.
//!
//! Two families of errors exist:
//!
//! - [`RegistrationError`] is raised while building the route table. It is
//!   fatal: registration aborts and nothing is retried.
//! - [`ApiError`] is raised by any stage of request dispatch. Every variant
//!   carries an HTTP status and a human message, and is converted by the
//!   dispatcher into a composed error response. It never escapes to the
//!   transport as an unhandled fault.
//!
//! | Variant | Status |
//! |---|---|
//! | `NotFound` | 404 |
//! | `MethodNotAllowed` | 405 |
//! | `NotAcceptable` | 406 |
//! | `Unauthorized` / `InvalidCredentials` | 401 |
//! | `Forbidden` | 403 |
//! | `BadRequest` | 400 |
//! | `UnsupportedMediaType` | 415 or 403 |
//! | `TooManyRequests` | 429 |
//! | `Internal` | 500 |
//! | `Status` | any |

use crate::method::HttpMethod;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`ApiError`].
pub type ApiResult<T> = Result<T, ApiError>;

/// A failure raised while dispatching a request.
///
/// # Example
///
/// ```
/// use hermes_core::ApiError;
/// use http::StatusCode;
///
/// let err = ApiError::bad_request("Invalid value specified for `id`");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// assert_eq!(err.error_message(), "Bad Request: Invalid value specified for `id`");
/// ```
#[derive(Error, Debug)]
pub enum ApiError {
    /// No route for the path or version.
    #[error("Not Found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// The path exists but not for the requested verb.
    #[error("Method Not Allowed")]
    MethodNotAllowed {
        /// Verbs the path is registered for.
        allowed: Vec<HttpMethod>,
    },

    /// Content negotiation failed (format, charset or language).
    #[error("Not Acceptable: {message}")]
    NotAcceptable {
        /// Human-readable error message.
        message: String,
    },

    /// Authentication failed on a protected route.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message.
        message: String,
        /// `WWW-Authenticate` challenge to send with the response.
        www_authenticate: Option<String>,
    },

    /// Credentials were presented but are invalid. Aborts authentication.
    #[error("Unauthorized: {message}")]
    InvalidCredentials {
        /// Human-readable error message.
        message: String,
        /// `WWW-Authenticate` challenge to send with the response.
        www_authenticate: Option<String>,
    },

    /// A filter or access check rejected the request.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
    },

    /// A parameter failed validation.
    #[error("Bad Request: {message}")]
    BadRequest {
        /// Human-readable error message.
        message: String,
        /// Name of the offending parameter, when known.
        parameter: Option<String>,
    },

    /// The request body format is not registered.
    #[error("Unsupported Media Type: {message}")]
    UnsupportedMediaType {
        /// Human-readable error message.
        message: String,
        /// Status to answer with (415, or 403 when configured).
        status: u16,
    },

    /// A rate limit was exceeded.
    #[error("Too Many Requests: {message}")]
    TooManyRequests {
        /// Human-readable error message.
        message: String,
        /// Seconds until the caller may retry.
        retry_after_secs: u64,
    },

    /// Unexpected failure during invocation or composition.
    #[error("Internal Server Error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (only exposed in debug mode).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// An error with an arbitrary status raised by an API method.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Human-readable error message.
        message: String,
    },
}

impl ApiError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a method not allowed error listing the permitted verbs.
    #[must_use]
    pub fn method_not_allowed(mut allowed: Vec<HttpMethod>) -> Self {
        allowed.sort();
        allowed.dedup();
        Self::MethodNotAllowed { allowed }
    }

    /// Creates a not acceptable error.
    #[must_use]
    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::NotAcceptable {
            message: message.into(),
        }
    }

    /// Creates an unauthorized error without a challenge.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            www_authenticate: None,
        }
    }

    /// Creates an invalid credentials error.
    #[must_use]
    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            message: message.into(),
            www_authenticate: None,
        }
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            parameter: None,
        }
    }

    /// Creates a validation failure for a named parameter.
    #[must_use]
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            parameter: Some(parameter.into()),
        }
    }

    /// Creates an unsupported media type error answered with `status`.
    #[must_use]
    pub fn unsupported_media_type(message: impl Into<String>, status: u16) -> Self {
        Self::UnsupportedMediaType {
            message: message.into(),
            status,
        }
    }

    /// Creates a rate limit error.
    #[must_use]
    pub fn too_many_requests(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::TooManyRequests {
            message: message.into(),
            retry_after_secs,
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error retaining the original error as its cause.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an error with an arbitrary HTTP status.
    #[must_use]
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Attaches a `WWW-Authenticate` challenge to a 401 error.
    #[must_use]
    pub fn with_www_authenticate(self, challenge: impl Into<String>) -> Self {
        match self {
            Self::Unauthorized { message, .. } => Self::Unauthorized {
                message,
                www_authenticate: Some(challenge.into()),
            },
            Self::InvalidCredentials { message, .. } => Self::InvalidCredentials {
                message,
                www_authenticate: Some(challenge.into()),
            },
            other => other,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            Self::Unauthorized { .. } | Self::InvalidCredentials { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType { status, .. } | Self::Status { code: status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message as written into the error body.
    ///
    /// The reason phrase alone when no detail was given, otherwise
    /// `"{reason}: {detail}"`.
    #[must_use]
    pub fn error_message(&self) -> String {
        let reason = self
            .status_code()
            .canonical_reason()
            .unwrap_or("Unknown Error");
        let detail = match self {
            Self::NotFound { message }
            | Self::NotAcceptable { message }
            | Self::Unauthorized { message, .. }
            | Self::InvalidCredentials { message, .. }
            | Self::Forbidden { message }
            | Self::BadRequest { message, .. }
            | Self::UnsupportedMediaType { message, .. }
            | Self::TooManyRequests { message, .. }
            | Self::Internal { message, .. }
            | Self::Status { message, .. } => message.as_str(),
            Self::MethodNotAllowed { .. } => "",
        };
        if detail.is_empty() {
            reason.to_string()
        } else {
            format!("{reason}: {detail}")
        }
    }

    /// Verbs to advertise in the `Allow` header, for 405 errors.
    #[must_use]
    pub fn allowed_methods(&self) -> Option<&[HttpMethod]> {
        match self {
            Self::MethodNotAllowed { allowed } => Some(allowed),
            _ => None,
        }
    }

    /// Challenge to advertise in the `WWW-Authenticate` header, for 401 errors.
    #[must_use]
    pub fn www_authenticate(&self) -> Option<&str> {
        match self {
            Self::Unauthorized {
                www_authenticate, ..
            }
            | Self::InvalidCredentials {
                www_authenticate, ..
            } => www_authenticate.as_deref(),
            _ => None,
        }
    }

    /// Returns true for 5xx errors.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Walks the cause chain into a list of messages for debug output.
    #[must_use]
    pub fn cause_chain(&self) -> Vec<String> {
        match self {
            Self::Internal {
                source: Some(source),
                ..
            } => source.chain().map(ToString::to_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Builds the serialisable error envelope.
    #[must_use]
    pub fn to_envelope(&self, debug: Option<DebugInfo>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                code: self.status_code().as_u16(),
                message: self.error_message(),
            },
            debug,
        }
    }
}

/// The standard error response body.
///
/// ```json
/// {"error": {"code": 404, "message": "Not Found"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error itself.
    pub error: ErrorBody,
    /// Diagnostics, present only in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// Code and message of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code.
    pub code: u16,
    /// Human-readable message.
    pub message: String,
}

/// Diagnostic details attached to error bodies in debug mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    /// Lifecycle stage that failed.
    pub stage: String,
    /// `Class::method` of the matched route, when routing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Cause chain of internal errors.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cause: Vec<String>,
}

/// A fatal error raised while building the route table.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// A documentation block could not be parsed.
    #[error("malformed documentation on {}: {reason}", location(.class, .method))]
    MalformedDoc {
        /// Class the block belongs to.
        class: String,
        /// Method the block belongs to, `None` for the class block.
        method: Option<String>,
        /// What is wrong with it.
        reason: String,
    },

    /// A route could not be built from a method.
    #[error("invalid route `{url}` on {class}::{method}: {reason}")]
    InvalidRoute {
        /// Class the method belongs to.
        class: String,
        /// Method name.
        method: String,
        /// URL being registered.
        url: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A URL template could not be compiled into a matcher.
    #[error("failed to compile route pattern `{pattern}`: {reason}")]
    Pattern {
        /// The URL template.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// The route table cache could not be read or written.
    #[error("route cache error: {0}")]
    Cache(String),
}

impl RegistrationError {
    /// Creates a malformed documentation error.
    #[must_use]
    pub fn malformed_doc(
        class: impl Into<String>,
        method: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedDoc {
            class: class.into(),
            method: method.map(ToString::to_string),
            reason: reason.into(),
        }
    }

    /// Creates an invalid route error.
    #[must_use]
    pub fn invalid_route(
        class: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRoute {
            class: class.into(),
            method: method.into(),
            url: url.into(),
            reason: reason.into(),
        }
    }
}

fn location(class: &str, method: &Option<String>) -> String {
    match method {
        Some(method) => format!("{class}::{method}"),
        None => class.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::not_found("").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::method_not_allowed(vec![HttpMethod::Get]).status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::invalid_credentials("bad token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::unsupported_media_type("nope", 403).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::too_many_requests("slow down", 10).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::status(418, "teapot").status_code().as_u16(), 418);
        assert_eq!(
            ApiError::status(1000, "bogus").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_message_uses_reason_phrase() {
        assert_eq!(ApiError::not_found("").error_message(), "Not Found");
        assert_eq!(
            ApiError::not_found("Version 3 is not supported").error_message(),
            "Not Found: Version 3 is not supported"
        );
        assert_eq!(
            ApiError::method_not_allowed(vec![HttpMethod::Get]).error_message(),
            "Method Not Allowed"
        );
    }

    #[test]
    fn test_method_not_allowed_sorts_and_dedups() {
        let err = ApiError::method_not_allowed(vec![
            HttpMethod::Delete,
            HttpMethod::Get,
            HttpMethod::Delete,
        ]);
        assert_eq!(
            err.allowed_methods(),
            Some(&[HttpMethod::Get, HttpMethod::Delete][..])
        );
    }

    #[test]
    fn test_www_authenticate() {
        let err = ApiError::unauthorized("").with_www_authenticate("Bearer realm=\"api\"");
        assert_eq!(err.www_authenticate(), Some("Bearer realm=\"api\""));
        let other = ApiError::forbidden("").with_www_authenticate("ignored");
        assert_eq!(other.www_authenticate(), None);
    }

    #[test]
    fn test_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = ApiError::internal_with_source("storage failed", io);
        assert_eq!(err.cause_chain(), vec!["disk on fire".to_string()]);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_envelope_serialization() {
        let envelope = ApiError::forbidden("").to_envelope(None);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": {"code": 403, "message": "Forbidden"}})
        );
    }

    #[test]
    fn test_registration_error_display() {
        let err = RegistrationError::malformed_doc("Authors", Some("get"), "unterminated `{@`");
        assert_eq!(
            err.to_string(),
            "malformed documentation on Authors::get: unterminated `{@`"
        );
        let err = RegistrationError::malformed_doc("Authors", None, "bad access");
        assert_eq!(err.to_string(), "malformed documentation on Authors: bad access");
    }
}
