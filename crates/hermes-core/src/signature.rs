//! Structural signatures of API classes.
//!
//! Resources describe their public surface explicitly: the methods they
//! expose, each method's parameters with their declared types and defaults,
//! and the models used as object parameters. Documentation text is attached
//! verbatim and parsed by the route table builder.
//!
//! # Example
//!
//! ```
//! use hermes_core::signature::{MethodSignature, ParamSignature, ResourceSignature};
//!
//! let signature = ResourceSignature::new("Authors")
//!     .method(MethodSignature::new("get").param(ParamSignature::new("id").typed("int")))
//!     .method(
//!         MethodSignature::new("post")
//!             .doc("@status 201")
//!             .param(ParamSignature::new("name").typed("string")),
//!     );
//! assert_eq!(signature.methods.len(), 2);
//! assert!(signature.methods[0].params[0].is_required());
//! ```

use serde_json::Value;

/// Visibility of a method on its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Callable by anyone; routed as declared.
    #[default]
    Public,
    /// Routed, but only reachable after authentication.
    Protected,
    /// Never routed.
    Private,
}

/// The public surface of one API class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceSignature {
    /// Short class name; the default resource path is its lower-case form.
    pub name: String,
    /// Class-level documentation.
    pub doc: String,
    /// Methods in declaration order.
    pub methods: Vec<MethodSignature>,
    /// Models referenced by parameter types.
    pub models: Vec<ModelSignature>,
    /// Highest API version the class supports.
    pub max_version: Option<u32>,
}

impl ResourceSignature {
    /// Creates an empty signature for class `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the class-level documentation.
    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn method(mut self, method: MethodSignature) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a model.
    #[must_use]
    pub fn model(mut self, model: ModelSignature) -> Self {
        self.models.push(model);
        self
    }

    /// Caps the versions the class is registered under.
    #[must_use]
    pub fn max_version(mut self, version: u32) -> Self {
        self.max_version = Some(version);
        self
    }

    /// Finds a method by name.
    #[must_use]
    pub fn find_method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// One method of an API class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodSignature {
    /// Method name.
    pub name: String,
    /// Visibility.
    pub visibility: Visibility,
    /// Static methods are never routed.
    pub is_static: bool,
    /// Method documentation.
    pub doc: String,
    /// Parameters in declaration order.
    pub params: Vec<ParamSignature>,
    /// Declared return type.
    pub return_type: Option<String>,
}

impl MethodSignature {
    /// Creates a public method named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Marks the method protected.
    #[must_use]
    pub fn protected(mut self) -> Self {
        self.visibility = Visibility::Protected;
        self
    }

    /// Marks the method private.
    #[must_use]
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Marks the method static.
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Sets the documentation.
    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Adds a parameter.
    #[must_use]
    pub fn param(mut self, param: ParamSignature) -> Self {
        self.params.push(param);
        self
    }

    /// Sets the declared return type.
    #[must_use]
    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = Some(type_name.into());
        self
    }

    /// Returns true if the builder may create routes for this method.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        !self.is_static && self.visibility != Visibility::Private && !self.name.starts_with('_')
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamSignature {
    /// Parameter name.
    pub name: String,
    /// Declared type, if any.
    pub type_name: Option<String>,
    /// `null` is accepted.
    pub nullable: bool,
    /// The parameter has a default value and may be omitted.
    pub optional: bool,
    /// Default value.
    pub default: Option<Value>,
}

impl ParamSignature {
    /// Creates a required, untyped parameter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the declared type. A trailing `[]` marks a list.
    #[must_use]
    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Makes the parameter optional with the given default.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            self.nullable = true;
        }
        self.default = Some(value);
        self.optional = true;
        self
    }

    /// Accepts `null`.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Returns true if the parameter has no default.
    #[must_use]
    pub fn is_required(&self) -> bool {
        !self.optional
    }
}

/// A structured type used as an object parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelSignature {
    /// Type name as referenced from parameter types.
    pub name: String,
    /// Model documentation.
    pub doc: String,
    /// Properties in declaration order.
    pub properties: Vec<PropertySignature>,
}

impl ModelSignature {
    /// Creates an empty model named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn property(mut self, property: PropertySignature) -> Self {
        self.properties.push(property);
        self
    }
}

/// One public property of a model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertySignature {
    /// Property name.
    pub name: String,
    /// Declared type, if any.
    pub type_name: Option<String>,
    /// Default value; properties with a default are optional.
    pub default: Option<Value>,
    /// Property documentation (`@var type {@min ..}` and friends).
    pub doc: String,
}

impl PropertySignature {
    /// Creates a required, untyped property.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the declared type.
    #[must_use]
    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the documentation.
    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routable() {
        assert!(MethodSignature::new("get").is_routable());
        assert!(MethodSignature::new("secret").protected().is_routable());
        assert!(!MethodSignature::new("helper").private().is_routable());
        assert!(!MethodSignature::new("_internal").is_routable());
        assert!(!MethodSignature::new("factory").static_method().is_routable());
    }

    #[test]
    fn test_null_default_makes_nullable() {
        let param = ParamSignature::new("filter").default_value(Value::Null);
        assert!(param.nullable);
        assert!(!param.is_required());
        let param = ParamSignature::new("page").default_value(1);
        assert!(!param.nullable);
        assert_eq!(param.default, Some(Value::from(1)));
    }

    #[test]
    fn test_find_method() {
        let sig = ResourceSignature::new("Authors")
            .method(MethodSignature::new("get"))
            .max_version(2);
        assert!(sig.find_method("get").is_some());
        assert!(sig.find_method("put").is_none());
        assert_eq!(sig.max_version, Some(2));
    }
}
