//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use hermes_core::AccessLevel;
use hermes_telemetry::LogFormat;

use crate::{ConfigError, HermesConfig};

/// Loads a [`HermesConfig`] in layers.
///
/// Later layers override earlier ones:
/// 1. Defaults or a preset
/// 2. A TOML or JSON file
/// 3. `PREFIX__SECTION__KEY` environment variables, optionally read from `.env`
///
/// # Example
///
/// ```no_run
/// use hermes_config::ConfigLoader;
///
/// # fn main() -> Result<(), hermes_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("hermes.toml")?
///     .with_env_prefix("HERMES")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: HermesConfig,
    env_prefix: Option<String>,
    dotenv: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Starts from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: HermesConfig::default(),
            env_prefix: None,
            dotenv: false,
        }
    }

    /// Starts from the development preset.
    ///
    /// ```
    /// use hermes_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert!(config.api.debug);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = HermesConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = HermesConfig::production();
        self
    }

    /// Loads a configuration file; the extension picks TOML or JSON.
    ///
    /// The file replaces the current configuration. Sections and keys it
    /// leaves out take their default values.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::unsupported_format(path.display().to_string()))?;
        self.config = parse(&content, &format)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in `toml` or `json` format.
    ///
    /// ```
    /// use hermes_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [api]
    ///     max_version = 3
    ///     use_url_based_versioning = true
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.api.max_version, 3);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Reads overrides from `PREFIX__SECTION__KEY` variables.
    ///
    /// For example, with prefix `HERMES`:
    /// - `HERMES__API__MAX_VERSION=2`
    /// - `HERMES__NEGOTIATION__SUPPORTED_LANGUAGES=en,de`
    /// - `HERMES__TELEMETRY__LOGGING__LEVEL=debug`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Reads a `.env` file into the environment before applying overrides.
    /// A missing file is ignored.
    #[must_use]
    pub fn with_dotenv(mut self) -> Self {
        self.dotenv = true;
        self
    }

    /// Applies environment overrides and validates the result.
    pub fn load(self) -> Result<HermesConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides without validating.
    pub fn load_unvalidated(mut self) -> Result<HermesConfig, ConfigError> {
        if self.dotenv {
            let _ = dotenvy::dotenv();
        }
        if let Some(prefix) = self.env_prefix.take() {
            let mut vars: Vec<(String, String)> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            vars.sort();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }
        Ok(self.config)
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = rest.split("__").collect();
        let c = &mut self.config;

        match parts.as_slice() {
            ["API", "MIN_VERSION"] => c.api.min_version = number(key, value)?,
            ["API", "MAX_VERSION"] => c.api.max_version = number(key, value)?,
            ["API", "VENDOR"] => c.api.vendor = optional(value),
            ["API", "USE_VENDOR_MIME_VERSIONING"] => {
                c.api.use_vendor_mime_versioning = boolean(key, value)?;
            }
            ["API", "USE_URL_BASED_VERSIONING"] => {
                c.api.use_url_based_versioning = boolean(key, value)?;
            }
            ["API", "ACCESS_LEVEL"] => {
                c.api.access_level = AccessLevel::from_annotation(value).ok_or_else(|| {
                    ConfigError::env_parse_error(key, "expected 'public', 'hybrid' or 'protected'")
                })?;
            }
            ["API", "DEBUG"] => c.api.debug = boolean(key, value)?,

            ["ROUTING", "SMART_AUTO_ROUTING"] => c.routing.smart_auto_routing = boolean(key, value)?,
            ["ROUTING", "SMART_PARAMETER_PARSING"] => {
                c.routing.smart_parameter_parsing = boolean(key, value)?;
            }
            ["ROUTING", "FULL_REQUEST_DATA_NAME"] => {
                c.routing.full_request_data_name = value.to_string();
            }
            ["ROUTING", "PREFIXING_PARAMETER_NAMES"] => {
                c.routing.prefixing_parameter_names = list(value);
            }
            ["ROUTING", "CACHE_ROUTES"] => c.routing.cache_routes = boolean(key, value)?,

            ["NEGOTIATION", "SUPPORTED_CHARSETS"] => c.negotiation.supported_charsets = list(value),
            ["NEGOTIATION", "CHARSET"] => c.negotiation.charset = value.to_string(),
            ["NEGOTIATION", "SUPPORTED_LANGUAGES"] => {
                c.negotiation.supported_languages = list(value);
            }
            ["NEGOTIATION", "LANGUAGE"] => c.negotiation.language = value.to_string(),
            ["NEGOTIATION", "UNSUPPORTED_MEDIA_TYPE_STATUS"] => {
                c.negotiation.unsupported_media_type_status = number(key, value)?;
            }

            ["RESPONSE", "CACHE_CONTROL"] => c.response.cache_control = value.to_string(),
            ["RESPONSE", "EXPIRES"] => c.response.expires = number(key, value)?,
            ["RESPONSE", "THROTTLE_MS"] => c.response.throttle_ms = number(key, value)?,
            ["RESPONSE", "EMPTY_BODY_FOR_NULL"] => {
                c.response.empty_body_for_null = boolean(key, value)?;
            }
            ["RESPONSE", "AUTO_VALIDATION"] => c.response.auto_validation = boolean(key, value)?,

            ["CORS", "ENABLED"] => c.cors.enabled = boolean(key, value)?,
            ["CORS", "ALLOW_ORIGIN"] => c.cors.allow_origin = value.to_string(),
            ["CORS", "ALLOW_METHODS"] => c.cors.allow_methods = value.to_string(),
            ["CORS", "MAX_AGE_SECS"] => c.cors.max_age_secs = number(key, value)?,

            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                c.telemetry.logging.enabled = boolean(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => c.telemetry.logging.level = value.to_string(),
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                c.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            // Unknown key
            _ => {}
        }
        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<HermesConfig, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        _ => Err(ConfigError::unsupported_format(format)),
    }
}

fn boolean(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn optional(value: &str) -> Option<String> {
    Some(value.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Splits a comma-separated list, dropping empty items.
fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
