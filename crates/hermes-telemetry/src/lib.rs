//! Observability for Hermes.
//!
//! - **Logging**: structured logs through `tracing-subscriber`, JSON in
//!   production and pretty-printed in development
//! - **Metrics**: request counters and latency histograms through the
//!   `metrics` facade
//!
//! The library never installs a metrics exporter; applications pick their
//! own recorder.
//!
//! # Example
//!
//! ```rust,no_run
//! use hermes_telemetry::{init_logging, metrics, LogConfig};
//!
//! init_logging(&LogConfig::production()).unwrap();
//! metrics::describe_metrics();
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig, LogFormat};
pub use self::metrics::{record_rejection, record_request, InFlightGuard};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
