//! Typed configuration for Hermes.
//!
//! - TOML and JSON configuration files
//! - `PREFIX__SECTION__KEY` environment overrides, optionally from `.env`
//! - Strict parsing: unknown sections and keys are errors
//! - Layered loading (defaults, then file, then environment)
//!
//! # Example
//!
//! ```no_run
//! use hermes_config::ConfigLoader;
//!
//! # fn main() -> Result<(), hermes_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("hermes.toml")?
//!     .with_env_prefix("HERMES")
//!     .with_dotenv()
//!     .load()?;
//!
//! let (settings, logging) = config.into_parts();
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration file format
//!
//! ```toml
//! [api]
//! min_version = 1
//! max_version = 2
//! use_url_based_versioning = true
//! access_level = "public"
//! debug = false
//!
//! [routing]
//! smart_auto_routing = true
//! full_request_data_name = "request_data"
//! prefixing_parameter_names = ["id"]
//!
//! [negotiation]
//! supported_charsets = ["utf-8"]
//! supported_languages = ["en"]
//! unsupported_media_type_status = 415
//!
//! [response]
//! cache_control = "no-cache, must-revalidate"
//! expires = 0
//! throttle_ms = 0
//!
//! [cors]
//! enabled = false
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;

pub use config::{HermesConfig, TelemetrySection};
pub use error::ConfigError;
pub use hermes_telemetry::{LogConfig, LogFormat};
pub use loader::ConfigLoader;
