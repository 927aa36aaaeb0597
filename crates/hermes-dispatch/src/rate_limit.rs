//! Rate limiting filter.
//!
//! Usage is counted per caller in fixed windows of one [`RateUnit`]. The
//! caller is the authenticated identity when there is one and the client IP
//! otherwise, so the filter runs after authentication and authenticated
//! callers can be given a larger quota.
//!
//! Counts live in a [`CacheStore`] under
//! `rate_limit_{limit}_per_{unit}_for_{group}_{caller}`, as
//! `{"time": window_start, "used": n}`.

use chrono::Utc;
use hermes_core::{ApiError, ApiResult, BoxFuture, CacheStore, Filter, RequestContext, SelectivePaths};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Rate limit header names.
pub mod headers {
    /// Quota for the current unit.
    pub const LIMIT: &str = "x-ratelimit-limit";
    /// Requests left in the current window.
    pub const REMAINING: &str = "x-ratelimit-remaining";
}

/// Length of a rate limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateUnit {
    /// One second.
    Second,
    /// One minute.
    Minute,
    /// One hour.
    #[default]
    Hour,
    /// One day.
    Day,
}

impl RateUnit {
    /// Window length in seconds.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    /// Lower-case unit name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

impl fmt::Display for RateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Limits how often a caller may hit the API.
///
/// # Example
///
/// ```
/// use hermes_dispatch::{MemoryCache, RateLimit, RateUnit};
/// use std::sync::Arc;
///
/// let limit = RateLimit::new(Arc::new(MemoryCache::new()))
///     .unit(RateUnit::Minute)
///     .limit(10)
///     .authenticated_limit(100);
/// ```
pub struct RateLimit {
    cache: Arc<dyn CacheStore>,
    unit: RateUnit,
    limit: u64,
    authenticated_limit: u64,
    group: String,
    paths: SelectivePaths,
}

impl fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimit")
            .field("unit", &self.unit)
            .field("limit", &self.limit)
            .field("authenticated_limit", &self.authenticated_limit)
            .field("group", &self.group)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl RateLimit {
    /// 1200 requests per hour, 5000 when authenticated.
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            unit: RateUnit::Hour,
            limit: 1_200,
            authenticated_limit: 5_000,
            group: "common".to_string(),
            paths: SelectivePaths::new(),
        }
    }

    /// Sets the window length.
    #[must_use]
    pub fn unit(mut self, unit: RateUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Sets the quota for anonymous callers.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the quota for authenticated callers.
    #[must_use]
    pub fn authenticated_limit(mut self, limit: u64) -> Self {
        self.authenticated_limit = limit;
        self
    }

    /// Names the counter group; limits with different groups count apart.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Restricts the limit to the selected paths.
    #[must_use]
    pub fn paths(mut self, paths: SelectivePaths) -> Self {
        self.paths = paths;
        self
    }

    fn check(&self, ctx: &mut RequestContext, now: i64) -> ApiResult<bool> {
        if !self.paths.is_selected(ctx.path()) {
            return Ok(true);
        }
        let authenticated = ctx.is_authenticated();
        let max = if authenticated {
            self.authenticated_limit
        } else {
            self.limit
        };
        let caller = match (authenticated, ctx.identity()) {
            (true, Some(identity)) => identity.to_string(),
            _ => client_ip(ctx),
        };
        let key = format!(
            "rate_limit_{max}_per_{}_for_{}_{caller}",
            self.unit, self.group
        );

        let last = self.cache.get(&key).unwrap_or(Value::Null);
        let mut time = last["time"].as_i64().unwrap_or(0);
        let mut used = last["used"].as_u64().unwrap_or(0);
        let window = self.unit.seconds();
        let elapsed = now - time;

        ctx.set_response_header(headers::LIMIT, &format!("{max} per {}", self.unit));
        if elapsed >= window {
            time = now;
            used = 1;
        } else if used >= max {
            ctx.set_response_header(headers::REMAINING, "0");
            let wait = u64::try_from(window - elapsed).unwrap_or(1);
            debug!(caller = %caller, unit = %self.unit, "rate limit exceeded");
            return Err(ApiError::too_many_requests(
                format!(
                    "Rate limit of {max} request{} per {} exceeded. Please wait for {}.",
                    if max == 1 { "" } else { "s" },
                    self.unit,
                    humanize(wait)
                ),
                wait,
            ));
        } else {
            used += 1;
        }

        ctx.set_response_header(headers::REMAINING, &max.saturating_sub(used).to_string());
        self.cache.set(&key, json!({"time": time, "used": used}));
        Ok(true)
    }
}

impl Filter for RateLimit {
    fn name(&self) -> &str {
        "rate_limit"
    }

    fn is_allowed<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ApiResult<bool>> {
        Box::pin(async move { self.check(ctx, Utc::now().timestamp()) })
    }

    fn uses_authentication(&self) -> bool {
        true
    }
}

/// The client address, preferring proxy headers.
fn client_ip(ctx: &RequestContext) -> String {
    ctx.header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .or_else(|| ctx.header("x-real-ip"))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Formats seconds as `1 hour 2 minutes 5 seconds`.
fn humanize(seconds: u64) -> String {
    let parts = [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")];
    let mut rest = seconds;
    let mut out = Vec::new();
    for (size, name) in parts {
        let n = rest / size;
        rest %= size;
        if n > 0 {
            out.push(format!("{n} {name}{}", if n == 1 { "" } else { "s" }));
        }
    }
    if out.is_empty() {
        "1 second".to_string()
    } else {
        out.join(" ")
    }
}
