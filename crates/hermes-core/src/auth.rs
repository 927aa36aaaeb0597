//! Authentication contract.

use crate::context::RequestContext;
use crate::error::ApiResult;
use crate::resource::BoxFuture;

/// Checks whether a request carries acceptable credentials.
///
/// Authenticators run in registration order during the authentication
/// stage. The return value is interpreted as follows:
///
/// - `Ok(true)`: the request is authenticated; iteration stops.
/// - `Ok(false)` or `Err(ApiError::Unauthorized { .. })`: this authenticator
///   failed; the next one is tried.
/// - `Err(ApiError::InvalidCredentials { .. })`: credentials were presented
///   but are wrong; authentication aborts immediately.
/// - any other error is propagated as is.
pub trait Authenticator: Send + Sync + 'static {
    /// Name used in logs and in [`AuthOutcome::Authenticated`](crate::AuthOutcome).
    fn name(&self) -> &str;

    /// Checks the request.
    fn is_allowed<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ApiResult<bool>>;

    /// Challenge sent in `WWW-Authenticate` on 401 responses.
    fn www_authenticate(&self) -> String;

    /// Returns true if the authenticator applies to `path`.
    fn applies_to(&self, path: &str) -> bool {
        let _ = path;
        true
    }
}

/// Include/exclude path prefix predicate for authenticators and filters.
///
/// Exclusions win over inclusions. With no inclusions every path not
/// excluded is selected.
///
/// ```
/// use hermes_core::SelectivePaths;
///
/// let paths = SelectivePaths::new()
///     .include("admin")
///     .exclude("admin/health");
/// assert!(paths.is_selected("/admin/users"));
/// assert!(!paths.is_selected("admin/health"));
/// assert!(!paths.is_selected("public"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectivePaths {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl SelectivePaths {
    /// Creates a predicate selecting every path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects paths starting with `prefix`.
    #[must_use]
    pub fn include(mut self, prefix: impl Into<String>) -> Self {
        self.include.push(normalize(&prefix.into()));
        self
    }

    /// Rejects paths starting with `prefix`.
    #[must_use]
    pub fn exclude(mut self, prefix: impl Into<String>) -> Self {
        self.exclude.push(normalize(&prefix.into()));
        self
    }

    /// Returns true if `path` is selected.
    #[must_use]
    pub fn is_selected(&self, path: &str) -> bool {
        let path = normalize(path);
        if self.exclude.iter().any(|p| path.starts_with(p.as_str())) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| path.starts_with(p.as_str()))
    }
}

fn normalize(path: &str) -> String {
    path.trim().trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selects_everything() {
        assert!(SelectivePaths::new().is_selected("anything/at/all"));
    }

    #[test]
    fn test_exclusion_wins() {
        let paths = SelectivePaths::new().include("").exclude("/login");
        assert!(paths.is_selected("users"));
        assert!(!paths.is_selected("login"));
    }

    #[test]
    fn test_inclusion_restricts() {
        let paths = SelectivePaths::new().include("/v1/private");
        assert!(paths.is_selected("v1/private/x"));
        assert!(!paths.is_selected("v1/public"));
    }
}
