//! URL variant generation for auto-routed methods.
//!
//! A method with path parameters can be reached through several URLs: the
//! bare resource path, and the path with each successive path parameter
//! appended. With smart auto-routing only the most specific URL is emitted
//! (or the bare one when there are no path parameters); with ambiguity
//! allowed every prefix is emitted. Parameters left out of a URL are read
//! from the query or body instead.

use hermes_core::ParameterDescriptor;

/// One URL to register and the path parameters it embeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlVariant {
    /// URL template without leading slash, e.g. `authors/{n0}`.
    pub url: String,
    /// Indexes of the parameters bound from this URL.
    pub path_params: Vec<usize>,
}

/// Generates the URL variants for `base` and its ordered path parameters.
///
/// ```
/// use hermes_core::{ParamSource, ParameterDescriptor};
/// use hermes_router::url_variants;
///
/// let mut id = ParameterDescriptor::new("id", 0);
/// id.type_name = "int".to_string();
/// id.source = ParamSource::Path;
///
/// let smart = url_variants("authors", &[&id], false);
/// assert_eq!(smart.len(), 1);
/// assert_eq!(smart[0].url, "authors/{n0}");
///
/// let ambiguous = url_variants("authors", &[&id], true);
/// let urls: Vec<_> = ambiguous.iter().map(|v| v.url.as_str()).collect();
/// assert_eq!(urls, ["authors", "authors/{n0}"]);
/// ```
#[must_use]
pub fn url_variants(
    base: &str,
    path_params: &[&ParameterDescriptor],
    allow_ambiguity: bool,
) -> Vec<UrlVariant> {
    let mut variants = Vec::new();
    let mut url = base.trim_matches('/').to_string();
    let mut included = Vec::with_capacity(path_params.len());

    if allow_ambiguity || path_params.is_empty() {
        variants.push(UrlVariant {
            url: url.clone(),
            path_params: Vec::new(),
        });
    }
    for (position, param) in path_params.iter().enumerate() {
        url = join_path(&url, &param.placeholder());
        included.push(param.index);
        if allow_ambiguity || position + 1 == path_params.len() {
            variants.push(UrlVariant {
                url: url.clone(),
                path_params: included.clone(),
            });
        }
    }
    variants
}

/// Joins two path fragments with exactly one slash.
#[must_use]
pub fn join_path(base: &str, segment: &str) -> String {
    let base = base.trim_end_matches('/');
    let segment = segment.trim_start_matches('/');
    match (base.is_empty(), segment.is_empty()) {
        (true, _) => segment.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{segment}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::ParamSource;

    fn path_param(name: &str, index: usize, type_name: &str) -> ParameterDescriptor {
        let mut param = ParameterDescriptor::new(name, index);
        param.type_name = type_name.to_string();
        param.source = ParamSource::Path;
        param
    }

    #[test]
    fn test_no_path_params_yields_bare_url() {
        let variants = url_variants("/authors/", &[], false);
        assert_eq!(
            variants,
            vec![UrlVariant {
                url: "authors".to_string(),
                path_params: vec![]
            }]
        );
        assert_eq!(url_variants("authors", &[], true).len(), 1);
    }

    #[test]
    fn test_smart_routing_emits_only_maximal_url() {
        let a = path_param("id", 0, "int");
        let b = path_param("slug", 2, "string");
        let variants = url_variants("books", &[&a, &b], false);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].url, "books/{n0}/{s2}");
        assert_eq!(variants[0].path_params, vec![0, 2]);
    }

    #[test]
    fn test_ambiguity_emits_every_prefix() {
        let a = path_param("id", 0, "int");
        let b = path_param("slug", 1, "string");
        let urls: Vec<String> = url_variants("books", &[&a, &b], true)
            .into_iter()
            .map(|v| v.url)
            .collect();
        assert_eq!(urls, vec!["books", "books/{n0}", "books/{n0}/{s1}"]);
    }

    #[test]
    fn test_empty_base() {
        let a = path_param("id", 0, "int");
        assert_eq!(url_variants("", &[&a], false)[0].url, "{n0}");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("a/", "/b"), "a/b");
        assert_eq!(join_path("", "b"), "b");
        assert_eq!(join_path("a", ""), "a");
    }
}
