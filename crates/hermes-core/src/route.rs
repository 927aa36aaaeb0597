//! Route value types.

use crate::method::HttpMethod;
use crate::param::{ParamSource, ParameterDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Governs whether authentication is required and whether failure is fatal.
///
/// Levels are ordered; the effective level of a request is the maximum of the
/// global default and the route level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// No authentication.
    #[default]
    Public,
    /// Authentication is attempted; failure proceeds unauthenticated.
    Hybrid,
    /// Authentication required by an `@access protected` annotation.
    #[serde(alias = "protected")]
    ProtectedByAnnotation,
    /// Authentication required because the method is not publicly visible.
    ProtectedByVisibility,
}

impl AccessLevel {
    /// Parses the value of an `@access` annotation.
    #[must_use]
    pub fn from_annotation(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Self::Public),
            "hybrid" => Some(Self::Hybrid),
            "protected" => Some(Self::ProtectedByAnnotation),
            _ => None,
        }
    }

    /// Returns true if authentication must be attempted.
    #[must_use]
    pub const fn requires_authentication(self) -> bool {
        !matches!(self, Self::Public)
    }

    /// Returns true if a failed authentication aborts the request.
    #[must_use]
    pub const fn is_strict(self) -> bool {
        matches!(
            self,
            Self::ProtectedByAnnotation | Self::ProtectedByVisibility
        )
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Public => "public",
            Self::Hybrid => "hybrid",
            Self::ProtectedByAnnotation => "protected",
            Self::ProtectedByVisibility => "protected_by_visibility",
        };
        f.write_str(name)
    }
}

/// The class and method a route dispatches to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Registered class name.
    pub class_name: String,
    /// Method name.
    pub method_name: String,
}

impl Target {
    /// Creates a target.
    #[must_use]
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class_name, self.method_name)
    }
}

/// Documentation-derived settings attached to a route.
///
/// Request-time overrides (`cache_control`, `expires`, `throttle_ms`,
/// `formats`) are applied to the per-request settings snapshot when the
/// route is matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMetadata {
    /// Short description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Success status (`@status`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Extra response headers (`@header`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    /// `Cache-Control` override (`@cache`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// `Expires` override in seconds (`@expires`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<u64>,
    /// Minimum response latency override (`@throttle`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_ms: Option<u64>,
    /// Declared return type (`@return`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Remaining tags, preserved verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Vec<String>>,
}

/// A registered `(version, url template, verb) -> (class, method)` binding.
///
/// Templates are stored without a leading slash. Path placeholders are
/// positional and type-tagged: `authors/{n0}` binds parameter 0, numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// URL template, e.g. `authors/{n0}`.
    pub url_template: String,
    /// Verb the route answers.
    pub http_method: HttpMethod,
    /// Dispatch target.
    pub target: Target,
    /// Parameters in signature order.
    pub parameters: Vec<ParameterDescriptor>,
    /// Access level.
    pub access_level: AccessLevel,
    /// Authenticators applicable to this path, in registration order.
    #[serde(default)]
    pub auth_classes: Vec<String>,
    /// Media types accepted for the request body; empty means any registered.
    #[serde(default)]
    pub request_media_types: Vec<String>,
    /// Media types the response may be produced in; empty means any registered.
    #[serde(default)]
    pub response_media_types: Vec<String>,
    /// API version this entry is registered under.
    pub api_version: u32,
    /// The route was registered with a trailing catch-all marker.
    #[serde(default)]
    pub wildcard: bool,
    /// Documentation-derived settings.
    #[serde(default)]
    pub metadata: RouteMetadata,
}

impl Route {
    /// Returns the template with a leading slash, for display.
    #[must_use]
    pub fn display_path(&self) -> String {
        format!("/{}", self.url_template)
    }

    /// Maps parameter names to their positions.
    #[must_use]
    pub fn arguments(&self) -> BTreeMap<&str, usize> {
        self.parameters
            .iter()
            .map(|p| (p.name.as_str(), p.index))
            .collect()
    }

    /// Returns the parameter at `index`.
    #[must_use]
    pub fn parameter(&self, index: usize) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.index == index)
    }

    /// Number of parameters read from anywhere but the path.
    #[must_use]
    pub fn non_path_parameter_count(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| p.source != ParamSource::Path)
            .count()
    }

    /// Returns true if the route requires a body-capable verb.
    #[must_use]
    pub fn has_body_parameters(&self) -> bool {
        self.parameters.iter().any(|p| p.source == ParamSource::Body)
    }
}
