//! Request metrics.
//!
//! Metrics go through the `metrics` facade; the application installs
//! whatever recorder it exports with. Without a recorder every call is a
//! no-op.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `hermes_requests_total` | Counter | `method`, `status` |
//! | `hermes_request_duration_seconds` | Histogram | `method` |
//! | `hermes_rejections_total` | Counter | `stage`, `status` |
//! | `hermes_in_flight_requests` | Gauge | - |

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Counter of completed requests.
pub const REQUESTS_TOTAL: &str = "hermes_requests_total";
/// Histogram of request latency.
pub const REQUEST_DURATION: &str = "hermes_request_duration_seconds";
/// Counter of requests rejected by a lifecycle stage.
pub const REJECTIONS_TOTAL: &str = "hermes_rejections_total";
/// Gauge of requests being dispatched.
pub const IN_FLIGHT: &str = "hermes_in_flight_requests";

/// Registers descriptions for the metrics above with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total number of dispatched requests");
    describe_histogram!(REQUEST_DURATION, "Request dispatch duration in seconds");
    describe_counter!(
        REJECTIONS_TOTAL,
        "Requests rejected by a lifecycle stage, by stage and status"
    );
    describe_gauge!(IN_FLIGHT, "Requests currently being dispatched");
}

/// Records a completed request.
pub fn record_request(method: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);
    histogram!(REQUEST_DURATION, "method" => method.to_string()).record(duration.as_secs_f64());
}

/// Records a request rejected at `stage`.
pub fn record_rejection(stage: &str, status_code: u16) {
    counter!(
        REJECTIONS_TOTAL,
        "stage" => stage.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);
}

/// Keeps the in-flight gauge raised while alive.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_a_no_op() {
        describe_metrics();
        record_request("GET", 200, Duration::from_millis(3));
        record_rejection("authenticated", 401);
        let guard = InFlightGuard::new();
        drop(guard);
    }
}
