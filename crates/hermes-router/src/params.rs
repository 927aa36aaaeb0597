//! Path values captured by the matcher.
//!
//! Captures are keyed by placeholder (`n0`, `s2`), which encodes both the
//! type class and the position of the parameter it feeds. Most routes have
//! one or two path parameters, so the pairs are stored inline.

use serde_json::Value;
use smallvec::SmallVec;

const INLINE_CAPTURES: usize = 4;

/// Path segments captured for a templated route.
///
/// ```
/// use hermes_router::PathParams;
///
/// let mut params = PathParams::new();
/// params.push("n0", "42");
/// params.push("s1", "tolkien");
/// assert_eq!(params.get(0), Some("42"));
/// assert_eq!(params.value(0), Some(serde_json::json!(42)));
/// assert_eq!(params.value(1), Some(serde_json::json!("tolkien")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathParams {
    inner: SmallVec<[(String, String); INLINE_CAPTURES]>,
}

impl PathParams {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the text captured for `placeholder`.
    pub fn push(&mut self, placeholder: impl Into<String>, value: impl Into<String>) {
        self.inner.push((placeholder.into(), value.into()));
    }

    /// Returns the raw text captured for parameter `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.inner
            .iter()
            .find(|(placeholder, _)| placeholder_index(placeholder) == Some(index))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the captured value for parameter `index`, as a number when
    /// the placeholder is numeric.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<Value> {
        let (placeholder, raw) = self
            .inner
            .iter()
            .find(|(placeholder, _)| placeholder_index(placeholder) == Some(index))?;
        if placeholder.starts_with('n') {
            if let Ok(int) = raw.parse::<i64>() {
                return Some(Value::from(int));
            }
            if let Some(number) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                return Some(Value::Number(number));
            }
        }
        Some(Value::String(raw.clone()))
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of captures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates over `(placeholder, text)` pairs in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(p, v)| (p.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// Parses the parameter position out of a placeholder name (`s12` -> 12).
#[must_use]
pub fn placeholder_index(placeholder: &str) -> Option<usize> {
    let mut chars = placeholder.chars();
    match chars.next() {
        Some('n' | 's') => chars.as_str().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_index() {
        assert_eq!(placeholder_index("n0"), Some(0));
        assert_eq!(placeholder_index("s12"), Some(12));
        assert_eq!(placeholder_index("x1"), None);
        assert_eq!(placeholder_index("n"), None);
    }

    #[test]
    fn test_numeric_values() {
        let params: PathParams = vec![
            ("n0".to_string(), "7".to_string()),
            ("n1".to_string(), "2.5".to_string()),
            ("s2".to_string(), "7".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(params.value(0), Some(Value::from(7)));
        assert_eq!(params.value(1), Some(serde_json::json!(2.5)));
        assert_eq!(params.value(2), Some(Value::from("7")));
        assert_eq!(params.value(3), None);
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_many_captures_spill() {
        let mut params = PathParams::new();
        for i in 0..8 {
            params.push(format!("s{i}"), format!("v{i}"));
        }
        assert_eq!(params.get(6), Some("v6"));
        assert_eq!(params.iter().count(), 8);
    }
}
