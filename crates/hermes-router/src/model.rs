//! Nested model resolution.
//!
//! Object parameters name a model type; their shape is described by the
//! model's properties. Resolution is memoized by `(prefix, type)` and guards
//! against self-referential models: a model met again while it is still being
//! resolved becomes an opaque reference instead of recursing.

use crate::descriptor::{apply_inline, TypeSpec};
use crate::docblock::DocBlock;
use hermes_core::signature::ModelSignature;
use hermes_core::{derive_label, ParamSource, ParameterDescriptor, RegistrationError};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Resolves model type names into child descriptors.
#[derive(Debug, Default)]
pub struct ModelResolver {
    models: BTreeMap<String, ModelSignature>,
    memo: HashMap<(String, String), Option<Vec<ParameterDescriptor>>>,
    in_progress: HashSet<String>,
}

impl ModelResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model. A later registration with the same name wins.
    pub fn register(&mut self, model: ModelSignature) {
        self.models.insert(model.name.clone(), model);
    }

    /// Returns true if `type_name` names a registered model.
    #[must_use]
    pub fn is_model(&self, type_name: &str) -> bool {
        self.models.contains_key(type_name)
    }

    /// Resolves the children of `type_name` reached through `prefix`.
    ///
    /// Returns `None` for types that are not registered models (they stay
    /// opaque) and for models re-entered while being resolved.
    pub fn resolve(
        &mut self,
        prefix: &str,
        type_name: &str,
    ) -> Result<Option<Vec<ParameterDescriptor>>, RegistrationError> {
        let key = (prefix.to_string(), type_name.to_string());
        if let Some(children) = self.memo.get(&key) {
            return Ok(children.clone());
        }
        let Some(model) = self.models.get(type_name).cloned() else {
            debug!(model = type_name, "unresolved model type left opaque");
            return Ok(None);
        };
        if !self.in_progress.insert(type_name.to_string()) {
            return Ok(None);
        }

        let result = self.build_children(prefix, &model);
        self.in_progress.remove(type_name);
        let children = result?;
        self.memo.insert(key, Some(children.clone()));
        Ok(Some(children))
    }

    fn build_children(
        &mut self,
        prefix: &str,
        model: &ModelSignature,
    ) -> Result<Vec<ParameterDescriptor>, RegistrationError> {
        let mut children = Vec::with_capacity(model.properties.len());
        for (index, property) in model.properties.iter().enumerate() {
            let doc = DocBlock::parse(&property.doc).map_err(|e| {
                RegistrationError::malformed_doc(&model.name, Some(&property.name), e.to_string())
            })?;
            let var = doc.var.unwrap_or_default();

            let declared = var
                .type_name
                .as_deref()
                .or(property.type_name.as_deref())
                .unwrap_or("mixed");
            let spec = TypeSpec::parse(declared, |t| self.is_model(t));

            let mut child = ParameterDescriptor::new(property.name.clone(), index);
            spec.apply_to(&mut child);
            child.source = ParamSource::Body;
            child.default = property.default.clone();
            child.required = property.default.is_none();
            child.nullable = property.default.as_ref().is_some_and(serde_json::Value::is_null);
            child.description = if var.description.is_empty() {
                doc.description.clone()
            } else {
                var.description.clone()
            };
            child.label = derive_label(&property.name);
            apply_inline(&mut child, &var.inline);

            if let Some(model_type) = spec.model_type() {
                let nested_prefix = if prefix.is_empty() {
                    property.name.clone()
                } else {
                    format!("{prefix}.{}", property.name)
                };
                child.children = self.resolve(&nested_prefix, model_type)?;
            }
            children.push(child);
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::signature::PropertySignature;

    fn author() -> ModelSignature {
        ModelSignature::new("Author")
            .property(PropertySignature::new("name").typed("string").doc("@var string {@min 2}"))
            .property(
                PropertySignature::new("email")
                    .typed("string")
                    .doc("@var string {@type email}"),
            )
            .property(PropertySignature::new("age").typed("int").default_value(0))
            .property(PropertySignature::new("mentor").typed("Author").default_value(serde_json::Value::Null))
    }

    #[test]
    fn test_resolves_properties() {
        let mut resolver = ModelResolver::new();
        resolver.register(author());
        let children = resolver.resolve("author", "Author").unwrap().unwrap();
        assert_eq!(children.len(), 4);
        assert_eq!(children[0].name, "name");
        assert!(children[0].required);
        assert_eq!(children[0].constraints.min, Some(2.0));
        assert_eq!(children[1].constraints.format.as_deref(), Some("email"));
        assert!(!children[2].required);
        assert_eq!(children[2].type_name, "int");
    }

    #[test]
    fn test_self_reference_is_opaque() {
        let mut resolver = ModelResolver::new();
        resolver.register(author());
        let children = resolver.resolve("author", "Author").unwrap().unwrap();
        let mentor = &children[3];
        assert!(!mentor.scalar);
        assert!(mentor.nullable);
        assert!(mentor.children.is_none());
    }

    #[test]
    fn test_unknown_type_is_opaque() {
        let mut resolver = ModelResolver::new();
        assert!(resolver.resolve("x", "Missing").unwrap().is_none());
    }

    #[test]
    fn test_memoized_by_prefix_and_type() {
        let mut resolver = ModelResolver::new();
        resolver.register(ModelSignature::new("Tag").property(PropertySignature::new("label")));
        let first = resolver.resolve("a", "Tag").unwrap();
        let second = resolver.resolve("a", "Tag").unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.memo.len(), 1);
        resolver.resolve("b", "Tag").unwrap();
        assert_eq!(resolver.memo.len(), 2);
    }

    #[test]
    fn test_malformed_property_doc() {
        let mut resolver = ModelResolver::new();
        resolver.register(
            ModelSignature::new("Broken")
                .property(PropertySignature::new("x").doc("@var int {@min")),
        );
        let err = resolver.resolve("p", "Broken").unwrap_err();
        assert!(err.to_string().contains("Broken::x"));
    }
}
