//! Parameter validation contract.

use crate::error::ApiResult;
use crate::param::ParameterDescriptor;
use serde_json::Value;

/// Validates and coerces one parameter value.
///
/// Implementations return the value to pass to the method, which may differ
/// from the input (`"15"` becomes `15`, or `10` when clamped), or a
/// `BadRequest` error naming the parameter.
pub trait Validator: Send + Sync + 'static {
    /// Validates `value` against `descriptor`.
    fn validate(&self, value: Value, descriptor: &ParameterDescriptor) -> ApiResult<Value>;
}
