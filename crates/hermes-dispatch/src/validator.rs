//! The default parameter validator.
//!
//! Values arrive from query strings and form bodies as strings, so every
//! scalar rule coerces before it checks: `"15"` becomes `15` for an `int`,
//! `"true"` becomes `true` for a `bool`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use hermes_core::{ApiError, ApiResult, ParameterDescriptor, Validator};
use regex::Regex;
use serde_json::{Map, Number, Value};

/// Type coercion and constraint checks driven by the descriptor.
///
/// | Type | Accepts | Range check |
/// |------|---------|-------------|
/// | `int`, `integer` | integers, integral strings | value |
/// | `float`, `double`, `number` | numbers, numeric strings | value |
/// | `string` | strings, numbers | length |
/// | `bool`, `boolean` | booleans, `true`/`false`/`1`/`0` | - |
/// | `email`, `date`, `datetime`, `timestamp` | formatted strings | - |
/// | `array` or lists | arrays; a scalar is wrapped | item count |
/// | models | objects, children checked recursively | - |
///
/// With `fix` set, out-of-range numbers are clamped, long strings are
/// truncated and an unknown choice becomes the first choice.
///
/// ```
/// use hermes_core::{ParameterDescriptor, Validator};
/// use hermes_dispatch::DefaultValidator;
/// use serde_json::json;
///
/// let mut count = ParameterDescriptor::new("count", 0);
/// count.type_name = "int".into();
/// count.constraints.max = Some(10.0);
/// count.constraints.fix = true;
/// assert_eq!(DefaultValidator.validate(json!("15"), &count).unwrap(), json!(10));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl Validator for DefaultValidator {
    fn validate(&self, value: Value, descriptor: &ParameterDescriptor) -> ApiResult<Value> {
        Check { descriptor }.run(value)
    }
}

struct Check<'a> {
    descriptor: &'a ParameterDescriptor,
}

impl Check<'_> {
    fn run(&self, value: Value) -> ApiResult<Value> {
        let d = self.descriptor;
        if value.is_null() {
            return if d.nullable || !d.required {
                Ok(Value::Null)
            } else {
                Err(self.fail(format!("`{}` is required.", d.name)))
            };
        }

        if d.multiple || d.type_name.eq_ignore_ascii_case("array") {
            return self.array(value);
        }

        let kind = d
            .constraints
            .format
            .as_deref()
            .unwrap_or(&d.type_name)
            .to_ascii_lowercase();
        let value = match kind.as_str() {
            "int" | "integer" => self.integer(&value)?,
            "float" | "double" | "number" => self.float(&value)?,
            "string" => self.string(value)?,
            "bool" | "boolean" => self.boolean(&value)?,
            "email" => self.email(value)?,
            "date" => self.formatted(value, "date", |s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            })?,
            "datetime" => self.formatted(value, "datetime", |s| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
                    || DateTime::parse_from_rfc3339(s).is_ok()
            })?,
            "timestamp" => self.timestamp(&value)?,
            "mixed" => value,
            _ if d.scalar => value,
            _ => self.object(value)?,
        };
        self.choice(value)
    }

    fn label(&self) -> &str {
        &self.descriptor.label
    }

    fn fail(&self, message: String) -> ApiError {
        let message = self
            .descriptor
            .constraints
            .message
            .clone()
            .unwrap_or(message);
        ApiError::invalid_parameter(&self.descriptor.name, message)
    }

    fn invalid(&self, expecting: &str) -> ApiError {
        self.fail(format!(
            "Invalid value specified for `{}`. Expecting {expecting} value",
            self.label()
        ))
    }

    fn integer(&self, value: &Value) -> ApiResult<Value> {
        let n = match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| self.invalid("integer"))?;

        let clamped = self.range(n as f64)?;
        Ok(Value::from(clamped as i64))
    }

    fn float(&self, value: &Value) -> ApiResult<Value> {
        let n = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
        .ok_or_else(|| self.invalid("float"))?;

        let clamped = self.range(n)?;
        Number::from_f64(clamped)
            .map(Value::Number)
            .ok_or_else(|| self.invalid("float"))
    }

    /// Checks `n` against min/max, clamping when `fix` is set.
    fn range(&self, n: f64) -> ApiResult<f64> {
        let c = &self.descriptor.constraints;
        if let Some(min) = c.min.filter(|min| n < *min) {
            return if c.fix {
                Ok(min)
            } else {
                Err(self.fail(format!(
                    "`{}` should be greater than or equal to {min}",
                    self.label()
                )))
            };
        }
        if let Some(max) = c.max.filter(|max| n > *max) {
            return if c.fix {
                Ok(max)
            } else {
                Err(self.fail(format!(
                    "`{}` should be less than or equal to {max}",
                    self.label()
                )))
            };
        }
        Ok(n)
    }

    fn string(&self, value: Value) -> ApiResult<Value> {
        let mut s = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return Err(self.invalid("string")),
        };
        let c = &self.descriptor.constraints;
        let len = s.chars().count() as f64;
        if let Some(min) = c.min.filter(|min| len < *min) {
            return Err(self.fail(format!(
                "`{}` should be at least {min} characters long",
                self.label()
            )));
        }
        if let Some(max) = c.max.filter(|max| len > *max) {
            if !c.fix {
                return Err(self.fail(format!(
                    "`{}` should be at most {max} characters long",
                    self.label()
                )));
            }
            s = s.chars().take(max as usize).collect();
        }
        if let Some(pattern) = &c.pattern {
            let re = Regex::new(pattern).map_err(|e| {
                ApiError::internal_with_source(
                    format!("invalid pattern for `{}`", self.descriptor.name),
                    e,
                )
            })?;
            if !re.is_match(&s) {
                return Err(self.invalid("string matching the required pattern"));
            }
        }
        Ok(Value::String(s))
    }

    fn boolean(&self, value: &Value) -> ApiResult<Value> {
        let b = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        b.map(Value::Bool).ok_or_else(|| self.invalid("boolean"))
    }

    fn email(&self, value: Value) -> ApiResult<Value> {
        self.formatted(value, "email", |s| {
            let Some((local, domain)) = s.split_once('@') else {
                return false;
            };
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !s.chars().any(char::is_whitespace)
        })
    }

    fn formatted(&self, value: Value, kind: &str, accept: impl Fn(&str) -> bool) -> ApiResult<Value> {
        match value {
            Value::String(s) if accept(s.trim()) => Ok(Value::String(s.trim().to_string())),
            _ => Err(self.invalid(kind)),
        }
    }

    fn timestamp(&self, value: &Value) -> ApiResult<Value> {
        let n = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        n.map(Value::from).ok_or_else(|| self.invalid("timestamp"))
    }

    fn array(&self, value: Value) -> ApiResult<Value> {
        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        let c = &self.descriptor.constraints;
        let count = items.len() as f64;
        if let Some(min) = c.min.filter(|min| count < *min) {
            return Err(self.fail(format!(
                "`{}` should have at least {min} items",
                self.label()
            )));
        }
        let mut items = items;
        if let Some(max) = c.max.filter(|max| count > *max) {
            if !c.fix {
                return Err(self.fail(format!(
                    "`{}` should have at most {max} items",
                    self.label()
                )));
            }
            items.truncate(max as usize);
        }

        let Some(element) = self.element_descriptor() else {
            return Ok(Value::Array(items));
        };
        items
            .into_iter()
            .map(|item| Check { descriptor: &element }.run(item))
            .collect::<ApiResult<Vec<_>>>()
            .map(Value::Array)
    }

    /// Descriptor applied to each element of a typed list.
    fn element_descriptor(&self) -> Option<ParameterDescriptor> {
        let d = self.descriptor;
        let content = d.content_type.as_deref()?;
        if content.eq_ignore_ascii_case("mixed") {
            return None;
        }
        let mut element = ParameterDescriptor::new(&d.name, d.index);
        element.label.clone_from(&d.label);
        element.type_name = content.to_string();
        element.scalar = d.children.is_none();
        element.children.clone_from(&d.children);
        element.constraints.pattern.clone_from(&d.constraints.pattern);
        element.constraints.choice.clone_from(&d.constraints.choice);
        element.constraints.message.clone_from(&d.constraints.message);
        Some(element)
    }

    fn object(&self, value: Value) -> ApiResult<Value> {
        let Value::Object(mut map) = value else {
            return Err(self.invalid("object"));
        };
        let Some(children) = &self.descriptor.children else {
            return Ok(Value::Object(map));
        };
        let mut checked = Map::new();
        for child in children {
            match map.remove(&child.name) {
                Some(v) if child.validate => {
                    let v = Check { descriptor: child }.run(v)?;
                    checked.insert(child.name.clone(), v);
                }
                Some(v) => {
                    checked.insert(child.name.clone(), v);
                }
                None if child.required => {
                    return Err(ApiError::invalid_parameter(
                        &child.name,
                        format!("`{}` is required.", child.name),
                    ));
                }
                None => {
                    if let Some(default) = &child.default {
                        checked.insert(child.name.clone(), default.clone());
                    }
                }
            }
        }
        checked.extend(map);
        Ok(Value::Object(checked))
    }

    fn choice(&self, value: Value) -> ApiResult<Value> {
        let c = &self.descriptor.constraints;
        let Some(choices) = c.choice.as_deref().filter(|c| !c.is_empty()) else {
            return Ok(value);
        };
        let text = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let hit = choices.iter().any(|choice| match choice {
            Value::String(s) => *s == text,
            other => *other == value,
        });
        if hit {
            return Ok(value);
        }
        if c.fix {
            return Ok(choices[0].clone());
        }
        let listed: Vec<String> = choices
            .iter()
            .map(|c| c.as_str().map_or_else(|| c.to_string(), ToString::to_string))
            .collect();
        Err(self.fail(format!(
            "Invalid value specified for `{}`. Expecting one of ({})",
            self.label(),
            listed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(name: &str, type_name: &str) -> ParameterDescriptor {
        let mut p = ParameterDescriptor::new(name, 0);
        p.type_name = type_name.to_string();
        p
    }

    fn check(value: Value, p: &ParameterDescriptor) -> ApiResult<Value> {
        DefaultValidator.validate(value, p)
    }

    #[test]
    fn test_int_clamps_only_with_fix() {
        let mut p = param("count", "int");
        p.constraints.min = Some(1.0);
        p.constraints.max = Some(10.0);
        p.constraints.fix = true;
        assert_eq!(check(json!("15"), &p).unwrap(), json!(10));
        assert_eq!(check(json!(0), &p).unwrap(), json!(1));

        p.constraints.fix = false;
        let err = check(json!("15"), &p).unwrap_err();
        assert_eq!(err.status_code().as_u16(), 400);
        assert_eq!(
            err.error_message(),
            "Bad Request: `Count` should be less than or equal to 10"
        );
    }

    #[test]
    fn test_int_rejects_garbage() {
        let p = param("id", "int");
        assert_eq!(check(json!(" 42 "), &p).unwrap(), json!(42));
        assert!(check(json!("4x"), &p).is_err());
        assert!(check(json!(1.5), &p).is_err());
    }

    #[test]
    fn test_float_and_bool() {
        assert_eq!(check(json!("2.5"), &param("ratio", "float")).unwrap(), json!(2.5));
        let flag = param("active", "bool");
        assert_eq!(check(json!("1"), &flag).unwrap(), json!(true));
        assert_eq!(check(json!("FALSE"), &flag).unwrap(), json!(false));
        assert!(check(json!("yes"), &flag).is_err());
    }

    #[test]
    fn test_string_length_and_pattern() {
        let mut p = param("zip", "string");
        p.constraints.pattern = Some(r"^\d{5}$".to_string());
        assert_eq!(check(json!(12345), &p).unwrap(), json!("12345"));
        assert!(check(json!("1234a"), &p).is_err());

        let mut name = param("name", "string");
        name.constraints.max = Some(3.0);
        assert!(check(json!("abcd"), &name).is_err());
        name.constraints.fix = true;
        assert_eq!(check(json!("abcd"), &name).unwrap(), json!("abc"));
    }

    #[test]
    fn test_formats() {
        assert!(check(json!("ann@example.com"), &param("e", "email")).is_ok());
        assert!(check(json!("ann@example"), &param("e", "email")).is_err());
        assert!(check(json!("2024-02-29"), &param("d", "date")).is_ok());
        assert!(check(json!("2023-02-29"), &param("d", "date")).is_err());
        assert!(check(json!("2024-01-01 10:00:00"), &param("t", "datetime")).is_ok());
        assert!(check(json!("2024-01-01T10:00:00Z"), &param("t", "datetime")).is_ok());
        assert_eq!(check(json!("1700000000"), &param("ts", "timestamp")).unwrap(), json!(1_700_000_000));

        let mut tagged = param("contact", "string");
        tagged.constraints.format = Some("email".to_string());
        assert!(check(json!("nope"), &tagged).is_err());
    }

    #[test]
    fn test_choice() {
        let mut p = param("sort", "string");
        p.constraints.choice = Some(vec![json!("asc"), json!("desc")]);
        assert_eq!(check(json!("desc"), &p).unwrap(), json!("desc"));
        let err = check(json!("up"), &p).unwrap_err();
        assert!(err.error_message().contains("(asc, desc)"));
        p.constraints.fix = true;
        assert_eq!(check(json!("up"), &p).unwrap(), json!("asc"));
    }

    #[test]
    fn test_array_wraps_and_checks_elements() {
        let mut ids = param("ids", "array");
        ids.scalar = false;
        ids.multiple = true;
        ids.content_type = Some("int".to_string());
        assert_eq!(check(json!("7"), &ids).unwrap(), json!([7]));
        assert_eq!(check(json!(["1", 2]), &ids).unwrap(), json!([1, 2]));
        assert!(check(json!(["x"]), &ids).is_err());
    }

    #[test]
    fn test_object_children() {
        let mut author = param("author", "Author");
        author.scalar = false;
        let mut name = param("name", "string");
        name.index = 0;
        let mut age = param("age", "int");
        age.required = false;
        age.default = Some(json!(18));
        author.children = Some(vec![name, age]);

        assert_eq!(
            check(json!({"name": "Ann", "extra": 1}), &author).unwrap(),
            json!({"name": "Ann", "age": 18, "extra": 1})
        );
        let err = check(json!({"age": "5"}), &author).unwrap_err();
        assert_eq!(err.error_message(), "Bad Request: `name` is required.");
        assert!(check(json!("flat"), &author).is_err());
    }

    #[test]
    fn test_null_handling_and_custom_message() {
        let mut p = param("id", "int");
        assert!(check(Value::Null, &p).is_err());
        p.nullable = true;
        assert_eq!(check(Value::Null, &p).unwrap(), Value::Null);

        let mut q = param("q", "int");
        q.constraints.message = Some("give me a number".to_string());
        assert_eq!(
            check(json!("x"), &q).unwrap_err().error_message(),
            "Bad Request: give me a number"
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_fixed_int_stays_in_range(n in -1_000i64..1_000, min in -50i64..0, max in 0i64..50) {
            let mut p = param("n", "int");
            p.constraints.min = Some(min as f64);
            p.constraints.max = Some(max as f64);
            p.constraints.fix = true;
            let v = check(Value::String(n.to_string()), &p).unwrap().as_i64().unwrap();
            proptest::prop_assert!((min..=max).contains(&v));
            proptest::prop_assert_eq!(v, n.clamp(min, max));
        }
    }
}
