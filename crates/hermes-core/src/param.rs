//! Parameter descriptors.
//!
//! A [`ParameterDescriptor`] describes one parameter of an API method: its
//! name, type, where the value is read from and which constraints the value
//! must satisfy. Descriptors are built once at registration and are immutable
//! afterwards; dispatch works on [`ResolvedParameter`] copies carrying the
//! runtime value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Where a parameter value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    /// A URL path placeholder.
    Path,
    /// The query string.
    #[default]
    Query,
    /// The decoded request body.
    Body,
    /// A request header.
    Header,
}

impl ParamSource {
    /// Parses the value of a `{@from ...}` annotation.
    #[must_use]
    pub fn from_annotation(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "path" | "url" => Some(Self::Path),
            "query" | "get" => Some(Self::Query),
            "body" | "post" | "data" => Some(Self::Body),
            "header" | "head" => Some(Self::Header),
            _ => None,
        }
    }
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Query => write!(f, "query"),
            Self::Body => write!(f, "body"),
            Self::Header => write!(f, "header"),
        }
    }
}

/// Value constraints checked by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Allowed values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<Vec<Value>>,
    /// Minimum numeric value, string length or item count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Maximum numeric value, string length or item count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regular expression a string value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Coerce out-of-range values instead of rejecting them.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fix: bool,
    /// Semantic string format (`email`, `date`, `datetime`, `timestamp`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Custom message used when validation fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Constraints {
    /// Returns true when no constraint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Describes one method parameter or one property of a nested model.
///
/// # Invariants
///
/// - `source == Path` only if `required && scalar`
/// - `children.is_some()` implies `!scalar`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Parameter name.
    pub name: String,
    /// Position in the method signature.
    pub index: usize,
    /// Display name.
    pub label: String,
    /// Primitive name (`int`, `string`, ...) or model name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Element type for arrays (`Author` for `Author[]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// The value is a list.
    pub multiple: bool,
    /// `null` is an acceptable value.
    pub nullable: bool,
    /// The value is a scalar (not an object or array).
    pub scalar: bool,
    /// Where the value is read from.
    pub source: ParamSource,
    /// The source was set by an explicit `{@from ...}` annotation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub explicit_source: bool,
    /// Default value used when the parameter is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// The parameter must be supplied.
    pub required: bool,
    /// Validate the value before invocation.
    pub validate: bool,
    /// Value constraints.
    #[serde(default, skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
    /// Free-text description from documentation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Nested shape for object/array parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ParameterDescriptor>>,
}

impl ParameterDescriptor {
    /// Creates a required scalar `string` descriptor read from the query.
    #[must_use]
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        let name = name.into();
        Self {
            label: derive_label(&name),
            name,
            index,
            type_name: "string".to_string(),
            content_type: None,
            multiple: false,
            nullable: false,
            scalar: true,
            source: ParamSource::Query,
            explicit_source: false,
            default: None,
            required: true,
            validate: true,
            constraints: Constraints::default(),
            description: String::new(),
            children: None,
        }
    }

    /// Returns true if the value is an object or an array.
    #[must_use]
    pub fn is_object_or_array(&self) -> bool {
        !self.scalar || self.multiple
    }

    /// Returns true if the declared type is numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        type_char(Some(&self.type_name)) == 'n'
    }

    /// Returns true if this parameter may be bound from a path segment.
    #[must_use]
    pub fn is_path_eligible(&self) -> bool {
        self.required && self.scalar && !self.multiple
    }

    /// Returns the placeholder (`{n0}`, `{s1}`) used for this parameter in URL templates.
    #[must_use]
    pub fn placeholder(&self) -> String {
        format!("{{{}{}}}", type_char(Some(&self.type_name)), self.index)
    }

    /// Finds a child descriptor by name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.children
            .as_deref()
            .and_then(|children| children.iter().find(|c| c.name == name))
    }
}

/// A request-scoped copy of a descriptor carrying the resolved value.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameter {
    /// The registered descriptor.
    pub descriptor: ParameterDescriptor,
    /// The bound value; `None` when the request did not supply one.
    pub value: Option<Value>,
}

impl ResolvedParameter {
    /// Creates an unbound copy of `descriptor`.
    #[must_use]
    pub fn unbound(descriptor: &ParameterDescriptor) -> Self {
        Self {
            descriptor: descriptor.clone(),
            value: None,
        }
    }

    /// Returns the value, falling back to the descriptor default, then `null`.
    #[must_use]
    pub fn value_or_default(&self) -> Value {
        self.value
            .clone()
            .or_else(|| self.descriptor.default.clone())
            .unwrap_or(Value::Null)
    }
}

const NUMERIC_TYPES: &[&str] = &["int", "integer", "float", "double", "number"];

const PRIMITIVE_TYPES: &[&str] = &[
    "int", "integer", "float", "double", "number", "string", "bool", "boolean", "mixed",
    "email", "date", "datetime", "timestamp",
];

/// Returns the placeholder type class of a type: `n` numeric, `s` otherwise.
///
/// ```
/// use hermes_core::type_char;
///
/// assert_eq!(type_char(Some("int")), 'n');
/// assert_eq!(type_char(Some("string")), 's');
/// assert_eq!(type_char(None), 's');
/// ```
#[must_use]
pub fn type_char(type_name: Option<&str>) -> char {
    match type_name {
        Some(t) if NUMERIC_TYPES.contains(&t.to_ascii_lowercase().as_str()) => 'n',
        _ => 's',
    }
}

/// Returns true if `type_name` names a scalar primitive.
#[must_use]
pub fn is_primitive_type(type_name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&type_name.to_ascii_lowercase().as_str())
}

/// Derives a display label from a parameter name.
///
/// `firstName` and `first_name` both become `First Name`.
#[must_use]
pub fn derive_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    let mut start_word = true;
    for ch in name.chars() {
        if ch == '_' || ch == '-' {
            if !label.is_empty() && !label.ends_with(' ') {
                label.push(' ');
            }
            start_word = true;
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            label.push(' ');
            start_word = true;
        }
        if start_word {
            label.extend(ch.to_uppercase());
        } else {
            label.push(ch);
        }
        start_word = false;
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
    }
    label.trim_end().to_string()
}
