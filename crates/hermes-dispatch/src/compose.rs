//! The default response envelope.

use hermes_core::{ApiError, Compose, DebugInfo};
use serde_json::{json, Value};

/// Passes results through unchanged and renders errors as
/// `{"error": {"code": N, "message": "..."}}`, with a `debug` object when
/// debug information is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCompose;

impl Compose for DefaultCompose {
    fn response(&self, result: Value) -> Value {
        result
    }

    fn message(&self, error: &ApiError, debug: Option<DebugInfo>) -> Value {
        serde_json::to_value(error.to_envelope(debug)).unwrap_or_else(|_| {
            json!({
                "error": {
                    "code": error.status_code().as_u16(),
                    "message": error.error_message(),
                }
            })
        })
    }
}
