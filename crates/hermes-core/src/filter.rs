//! Request filter contract.

use crate::context::RequestContext;
use crate::error::ApiResult;
use crate::resource::BoxFuture;

/// A gatekeeper run before invocation.
///
/// Filters that do not depend on the authentication outcome run before the
/// authentication stage; those returning `true` from
/// [`uses_authentication`](Filter::uses_authentication) run after it.
/// `Ok(false)` rejects the request with 403; an error is propagated as is,
/// which lets a filter answer with its own status (429 for rate limits).
pub trait Filter: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Checks the request.
    fn is_allowed<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ApiResult<bool>>;

    /// Returns true if the filter needs the authentication outcome.
    fn uses_authentication(&self) -> bool {
        false
    }
}
