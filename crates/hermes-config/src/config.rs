//! Top-level configuration type.

use hermes_core::{
    ApiSettings, CorsSettings, NegotiationSettings, ResponseSettings, RoutingSettings, Settings,
};
use hermes_telemetry::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Complete Hermes configuration.
///
/// Every section except `telemetry` becomes part of the [`Settings`]
/// snapshot the dispatcher copies into each request.
///
/// # Example
///
/// ```
/// use hermes_config::HermesConfig;
///
/// let config = HermesConfig::default();
/// assert_eq!(config.api.max_version, 1);
/// assert_eq!(config.routing.full_request_data_name, "request_data");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct HermesConfig {
    /// Versioning, access and debug settings.
    #[serde(default)]
    pub api: ApiSettings,

    /// Route table builder settings.
    #[serde(default)]
    pub routing: RoutingSettings,

    /// Content negotiation settings.
    #[serde(default)]
    pub negotiation: NegotiationSettings,

    /// Response header and body settings.
    #[serde(default)]
    pub response: ResponseSettings,

    /// Cross-origin settings.
    #[serde(default)]
    pub cors: CorsSettings,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// The `[telemetry]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySection {
    /// Log level and output format.
    pub logging: LogConfig,
}

impl HermesConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when:
    /// - a version bound is zero or `min_version > max_version`
    /// - `unsupported_media_type_status` is neither 403 nor 415
    /// - vendor MIME versioning is on without a vendor
    /// - the default charset or language is not in its supported list
    pub fn validate(&self) -> Result<(), ConfigError> {
        let api = &self.api;
        if api.min_version == 0 {
            return Err(ConfigError::invalid_value(
                "api.min_version",
                "must be at least 1",
            ));
        }
        if api.min_version > api.max_version {
            return Err(ConfigError::invalid_value(
                "api.max_version",
                format!(
                    "must not be lower than min_version ({} > {})",
                    api.min_version, api.max_version
                ),
            ));
        }
        if api.use_vendor_mime_versioning
            && api.vendor.as_deref().map_or(true, |v| v.trim().is_empty())
        {
            return Err(ConfigError::invalid_value(
                "api.vendor",
                "must be set when use_vendor_mime_versioning is on",
            ));
        }

        let negotiation = &self.negotiation;
        if !matches!(negotiation.unsupported_media_type_status, 403 | 415) {
            return Err(ConfigError::invalid_value(
                "negotiation.unsupported_media_type_status",
                format!(
                    "expected 403 or 415, got {}",
                    negotiation.unsupported_media_type_status
                ),
            ));
        }
        if !contains_ignore_case(&negotiation.supported_charsets, &negotiation.charset) {
            return Err(ConfigError::invalid_value(
                "negotiation.charset",
                format!("`{}` is not in supported_charsets", negotiation.charset),
            ));
        }
        if !contains_ignore_case(&negotiation.supported_languages, &negotiation.language) {
            return Err(ConfigError::invalid_value(
                "negotiation.language",
                format!("`{}` is not in supported_languages", negotiation.language),
            ));
        }

        Ok(())
    }

    /// Local development: debug error bodies and pretty debug logs.
    ///
    /// ```
    /// use hermes_config::HermesConfig;
    ///
    /// let config = HermesConfig::development();
    /// assert!(config.api.debug);
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.api.debug = true;
        config.telemetry.logging = LogConfig::development();
        config
    }

    /// Production: route caching on, JSON logs at `info`.
    ///
    /// ```
    /// use hermes_config::{HermesConfig, LogFormat};
    ///
    /// let config = HermesConfig::production();
    /// assert!(!config.api.debug);
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.api.debug = false;
        config.routing.cache_routes = true;
        config.telemetry.logging = LogConfig::production();
        config.telemetry.logging.format = LogFormat::Json;
        config
    }

    /// The dispatch settings carried by this configuration.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            api: self.api.clone(),
            routing: self.routing.clone(),
            negotiation: self.negotiation.clone(),
            response: self.response.clone(),
            cors: self.cors.clone(),
        }
    }

    /// Consumes the configuration, returning the dispatch settings and the
    /// logging configuration.
    #[must_use]
    pub fn into_parts(self) -> (Settings, LogConfig) {
        let settings = Settings {
            api: self.api,
            routing: self.routing,
            negotiation: self.negotiation,
            response: self.response,
            cors: self.cors,
        };
        (settings, self.telemetry.logging)
    }
}

impl From<HermesConfig> for Settings {
    fn from(config: HermesConfig) -> Self {
        config.into_parts().0
    }
}

fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}
