//! Parameter descriptors from signatures and documentation.

use crate::docblock::{InlineTags, ParamDoc};
use crate::model::ModelResolver;
use hermes_core::signature::ParamSignature;
use hermes_core::{is_primitive_type, ParameterDescriptor, RegistrationError};
use serde_json::Value;

/// A declared type split into the descriptor's shape flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeSpec {
    type_name: String,
    content_type: Option<String>,
    multiple: bool,
    scalar: bool,
    model: Option<String>,
}

impl TypeSpec {
    /// Parses `int`, `string[]`, `array`, `object` or a model name.
    ///
    /// Unknown non-primitive names that are not registered models stay
    /// opaque scalars.
    pub(crate) fn parse(declared: &str, is_model: impl Fn(&str) -> bool) -> Self {
        let declared = declared.trim().trim_start_matches('\\');
        if let Some(inner) = declared.strip_suffix("[]") {
            return Self {
                type_name: "array".to_string(),
                content_type: Some(inner.to_string()),
                multiple: true,
                scalar: false,
                model: is_model(inner).then(|| inner.to_string()),
            };
        }
        match declared.to_ascii_lowercase().as_str() {
            "array" => Self {
                type_name: "array".to_string(),
                content_type: None,
                multiple: true,
                scalar: false,
                model: None,
            },
            "object" | "stdclass" => Self {
                type_name: "object".to_string(),
                content_type: None,
                multiple: false,
                scalar: false,
                model: None,
            },
            lower if is_primitive_type(lower) => Self {
                type_name: lower.to_string(),
                content_type: None,
                multiple: false,
                scalar: true,
                model: None,
            },
            _ => {
                let model = is_model(declared);
                Self {
                    type_name: declared.to_string(),
                    content_type: None,
                    multiple: false,
                    scalar: !model,
                    model: model.then(|| declared.to_string()),
                }
            }
        }
    }

    /// Returns the model whose properties describe this type's children.
    pub(crate) fn model_type(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub(crate) fn apply_to(&self, descriptor: &mut ParameterDescriptor) {
        descriptor.type_name.clone_from(&self.type_name);
        descriptor.content_type.clone_from(&self.content_type);
        descriptor.multiple = self.multiple;
        descriptor.scalar = self.scalar;
    }
}

/// Copies inline constraint tags onto a descriptor.
pub(crate) fn apply_inline(descriptor: &mut ParameterDescriptor, inline: &InlineTags) {
    let constraints = &mut descriptor.constraints;
    if inline.min.is_some() {
        constraints.min = inline.min;
    }
    if inline.max.is_some() {
        constraints.max = inline.max;
    }
    if let Some(choice) = &inline.choice {
        constraints.choice = Some(choice.iter().cloned().map(Value::String).collect());
    }
    if inline.pattern.is_some() {
        constraints.pattern.clone_from(&inline.pattern);
    }
    if let Some(fix) = inline.fix {
        constraints.fix = fix;
    }
    if inline.format.is_some() {
        constraints.format.clone_from(&inline.format);
    }
    if inline.message.is_some() {
        constraints.message.clone_from(&inline.message);
    }
    if let Some(label) = &inline.label {
        descriptor.label.clone_from(label);
    }
    if let Some(validate) = inline.validate {
        descriptor.validate = validate;
    }
    if let Some(required) = inline.required {
        descriptor.required = required;
    }
}

/// Builds the descriptor of one method parameter.
///
/// The documented type refines the declared one when the declaration is
/// missing or generic (`array`, `object`, `mixed`). Sources are left at
/// their default; the builder assigns them.
pub(crate) fn describe_param(
    index: usize,
    signature: &ParamSignature,
    doc: Option<&ParamDoc>,
    models: &mut ModelResolver,
) -> Result<ParameterDescriptor, RegistrationError> {
    let documented = doc.and_then(|d| d.type_name.as_deref());
    let declared = match (signature.type_name.as_deref(), documented) {
        (Some(declared), Some(documented))
            if matches!(
                declared.to_ascii_lowercase().as_str(),
                "array" | "object" | "mixed"
            ) =>
        {
            documented
        }
        (Some(declared), _) => declared,
        (None, Some(documented)) => documented,
        (None, None) => "mixed",
    };
    let spec = TypeSpec::parse(declared, |t| models.is_model(t));

    let mut descriptor = ParameterDescriptor::new(signature.name.clone(), index);
    spec.apply_to(&mut descriptor);
    descriptor.required = signature.is_required();
    descriptor.nullable = signature.nullable;
    descriptor.default = signature.default.clone();

    if let Some(doc) = doc {
        descriptor.description.clone_from(&doc.description);
        apply_inline(&mut descriptor, &doc.inline);
    }
    if let Some(model) = spec.model_type() {
        descriptor.children = models.resolve(&signature.name, model)?;
    }
    Ok(descriptor)
}
