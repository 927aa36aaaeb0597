//! Filter stages.

use hermes_core::{ApiError, ApiResult, Filter, RequestContext};
use std::sync::Arc;
use tracing::debug;

/// Runs, in registration order, the filters whose
/// [`uses_authentication`](Filter::uses_authentication) equals
/// `after_auth`. The first `false` fails with 403.
pub(crate) async fn run_filters(
    ctx: &mut RequestContext,
    filters: &[Arc<dyn Filter>],
    after_auth: bool,
) -> ApiResult<()> {
    for filter in filters.iter().filter(|f| f.uses_authentication() == after_auth) {
        if !filter.is_allowed(ctx).await? {
            debug!(filter = filter.name(), "request rejected by filter");
            return Err(ApiError::forbidden(""));
        }
    }
    Ok(())
}
