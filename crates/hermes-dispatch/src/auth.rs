//! The authentication stage.

use hermes_core::{ApiError, ApiResult, AuthOutcome, Authenticator, RequestContext};
use std::sync::Arc;
use tracing::debug;

/// Runs the authenticators that apply to the matched route.
///
/// Authenticators are tried one at a time in registration order. The first
/// success ends the stage. [`ApiError::InvalidCredentials`] or any error
/// other than `Unauthorized` aborts at once. When every authenticator
/// declines, hybrid routes continue with [`AuthOutcome::Rejected`] and
/// protected routes fail with the first `Unauthorized` recorded. Every 401
/// leaving this stage carries the first authenticator's challenge.
pub(crate) async fn authenticate(
    ctx: &mut RequestContext,
    authenticators: &[Arc<dyn Authenticator>],
) -> ApiResult<()> {
    let Some(route) = ctx.route() else {
        return Ok(());
    };
    let level = route.access_level.max(ctx.settings().api.access_level);
    if !level.requires_authentication() {
        ctx.set_auth(AuthOutcome::NotRequired);
        return Ok(());
    }

    let applicable: Vec<Arc<dyn Authenticator>> = authenticators
        .iter()
        .filter(|a| route.auth_classes.iter().any(|name| name == a.name()))
        .cloned()
        .collect();

    if applicable.is_empty() {
        if level.is_strict() {
            return Err(ApiError::forbidden(
                "at least one Authentication Class is required",
            ));
        }
        ctx.set_auth(AuthOutcome::NoAuthenticator);
        return Ok(());
    }

    let mut first_failure: Option<ApiError> = None;
    for authenticator in &applicable {
        match authenticator.is_allowed(ctx).await {
            Ok(true) => {
                debug!(authenticator = authenticator.name(), "request authenticated");
                ctx.set_auth(AuthOutcome::Authenticated {
                    by: authenticator.name().to_string(),
                });
                return Ok(());
            }
            Ok(false) => {
                first_failure.get_or_insert_with(|| ApiError::unauthorized(""));
            }
            Err(err @ ApiError::Unauthorized { .. }) => {
                first_failure.get_or_insert(err);
            }
            Err(err @ ApiError::InvalidCredentials { .. }) => {
                return Err(challenge(err, &applicable));
            }
            Err(err) => return Err(err),
        }
        debug!(authenticator = authenticator.name(), "authenticator declined");
    }

    if !level.is_strict() {
        ctx.set_auth(AuthOutcome::Rejected);
        return Ok(());
    }

    let err = first_failure.unwrap_or_else(|| ApiError::unauthorized(""));
    Err(challenge(err, &applicable))
}

fn challenge(err: ApiError, applicable: &[Arc<dyn Authenticator>]) -> ApiError {
    match applicable.first() {
        Some(first) if err.www_authenticate().is_none() => {
            err.with_www_authenticate(first.www_authenticate())
        }
        _ => err,
    }
}
