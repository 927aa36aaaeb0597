//! Response envelope contract.

use crate::error::{ApiError, DebugInfo};
use serde_json::Value;

/// Wraps results and errors into the body written to the client.
pub trait Compose: Send + Sync + 'static {
    /// Wraps a successful result.
    fn response(&self, result: Value) -> Value;

    /// Builds the body of an error response.
    fn message(&self, error: &ApiError, debug: Option<DebugInfo>) -> Value;
}
