//! Route matching.
//!
//! [`RouteMatcher`] compiles a [`RouteTable`] once and resolves request paths
//! against it. Candidates are tried in a fixed order:
//!
//! 1. static templates, by exact key;
//! 2. wildcard prefixes, longest first;
//! 3. templated routes, in ascending template order, skipping a template
//!    when a numeric placeholder captured non-numeric text.
//!
//! A path that matched only under other verbs fails with 405; anything else
//! fails with 404.

use crate::params::PathParams;
use crate::table::{RouteTable, VerbMap};
use hermes_core::{
    ApiError, ApiResult, HttpMethod, ParamSource, RegistrationError, ResolvedParameter, Route,
    RoutingSettings,
};
use http::HeaderMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Marker substituted for empty path segments so they still match a
/// placeholder instead of merging with their neighbour.
const EMPTY_SEGMENT: &str = "\n";

type RouteSet = BTreeMap<HttpMethod, Arc<Route>>;

/// A resolved route with the path values captured for it.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route.
    pub route: Arc<Route>,
    /// Values captured by templated routes.
    pub params: PathParams,
    /// Remaining path segments of a wildcard route.
    pub wildcard_args: Vec<String>,
}

impl RouteMatch {
    /// Binds request values to the route's parameters.
    ///
    /// Path parameters come from the captures, header parameters from
    /// `headers`, and everything else from `data` (query merged with body).
    /// Wildcard segments fill positional parameters that are still unbound.
    /// With smart parameter parsing, a route whose only non-path parameter is
    /// unbound receives the whole request body when its shape fits.
    #[must_use]
    pub fn bind(
        &self,
        data: &Map<String, Value>,
        headers: &HeaderMap,
        routing: &RoutingSettings,
    ) -> Vec<ResolvedParameter> {
        let full_name = routing.full_request_data_name.as_str();
        let mut resolved: Vec<ResolvedParameter> = self
            .route
            .parameters
            .iter()
            .map(|descriptor| {
                let value = if descriptor.name == full_name {
                    data.get(full_name).cloned()
                } else {
                    match descriptor.source {
                        ParamSource::Path => self.params.value(descriptor.index),
                        ParamSource::Header => header_value(headers, &descriptor.name),
                        ParamSource::Query | ParamSource::Body => {
                            data.get(&descriptor.name).cloned()
                        }
                    }
                };
                ResolvedParameter {
                    descriptor: descriptor.clone(),
                    value,
                }
            })
            .collect();

        if self.route.wildcard {
            for (param, arg) in resolved.iter_mut().zip(&self.wildcard_args) {
                if param.value.is_none() {
                    param.value = Some(Value::String(arg.clone()));
                }
            }
        }

        if routing.smart_parameter_parsing {
            let mut non_path = resolved
                .iter_mut()
                .filter(|p| p.descriptor.source != ParamSource::Path);
            if let (Some(only), None) = (non_path.next(), non_path.next()) {
                if only.value.is_none() && only.descriptor.name != full_name {
                    if let Some(body) = data.get(full_name) {
                        if shape_matches(only, body) {
                            only.value = Some(body.clone());
                        }
                    }
                }
            }
        }
        resolved
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<Value> {
    let header = name.replace('_', "-").to_ascii_lowercase();
    headers
        .get(header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(|v| Value::String(v.to_string()))
}

fn shape_matches(param: &ResolvedParameter, value: &Value) -> bool {
    let structured = matches!(value, Value::Object(_) | Value::Array(_));
    if param.descriptor.is_object_or_array() {
        structured && !(param.descriptor.multiple && value.is_object())
    } else {
        !structured
    }
}

#[derive(Debug)]
struct CompiledTemplate {
    regex: Regex,
    numeric: Vec<String>,
    placeholders: Vec<String>,
    routes: RouteSet,
}

#[derive(Debug, Default)]
struct CompiledVersion {
    statics: BTreeMap<String, RouteSet>,
    dynamic: Vec<CompiledTemplate>,
    wildcards: Vec<(String, RouteSet)>,
}

/// Resolves paths to routes.
#[derive(Debug)]
pub struct RouteMatcher {
    min_version: u32,
    max_version: u32,
    versions: BTreeMap<u32, CompiledVersion>,
}

impl RouteMatcher {
    /// Compiles `table`.
    pub fn new(table: &RouteTable) -> Result<Self, RegistrationError> {
        let mut versions = BTreeMap::new();
        for version in table.min_version()..=table.max_version() {
            let Some(routes) = table.version(version) else {
                continue;
            };
            let mut compiled = CompiledVersion::default();
            for (template, verbs) in &routes.routes {
                let set = to_route_set(verbs);
                if template.contains('{') {
                    compiled.dynamic.push(compile_template(template, set)?);
                } else {
                    compiled.statics.insert(template.clone(), set);
                }
            }
            compiled.wildcards = routes
                .wildcard
                .iter()
                .map(|(prefix, verbs)| (prefix.clone(), to_route_set(verbs)))
                .collect();
            compiled
                .wildcards
                .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            versions.insert(version, compiled);
        }
        Ok(Self {
            min_version: table.min_version(),
            max_version: table.max_version(),
            versions,
        })
    }

    /// Finds the route for `path` answering `method` in `version`.
    ///
    /// `HEAD` falls back to the `GET` route of the same path.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the version is unsupported or nothing matches;
    /// - `MethodNotAllowed` when the path matched only under other verbs.
    pub fn find(&self, path: &str, method: HttpMethod, version: u32) -> ApiResult<RouteMatch> {
        if !(self.min_version..=self.max_version).contains(&version) {
            return Err(ApiError::not_found(format!(
                "Version {version} is not supported"
            )));
        }
        let Some(compiled) = self.versions.get(&version) else {
            return Err(ApiError::not_found(""));
        };
        let path = path.trim_start_matches('/');
        let mut allowed = BTreeSet::new();

        if let Some(set) = compiled.statics.get(path) {
            if let Some(route) = pick(set, method) {
                return Ok(RouteMatch {
                    route,
                    params: PathParams::new(),
                    wildcard_args: Vec::new(),
                });
            }
            allowed.extend(set.keys().copied());
        }

        for (prefix, set) in &compiled.wildcards {
            let rest = if prefix.is_empty() {
                Some(path)
            } else if path == prefix {
                Some("")
            } else {
                path.strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
            };
            let Some(rest) = rest else {
                continue;
            };
            if let Some(route) = pick(set, method) {
                let wildcard_args = if rest.is_empty() {
                    Vec::new()
                } else {
                    rest.split('/').map(ToString::to_string).collect()
                };
                return Ok(RouteMatch {
                    route,
                    params: PathParams::new(),
                    wildcard_args,
                });
            }
            allowed.extend(set.keys().copied());
        }

        let subject = mark_empty_segments(path);
        for template in &compiled.dynamic {
            let Some(captures) = template.regex.captures(&subject) else {
                continue;
            };
            let numeric_ok = template.numeric.iter().all(|name| {
                captures
                    .name(name)
                    .map(|m| m.as_str().trim_matches('\n'))
                    .is_some_and(is_numeric)
            });
            if !numeric_ok {
                continue;
            }
            if let Some(route) = pick(&template.routes, method) {
                let params = template
                    .placeholders
                    .iter()
                    .filter_map(|name| {
                        captures.name(name).map(|m| {
                            (name.clone(), m.as_str().trim_matches('\n').to_string())
                        })
                    })
                    .collect();
                return Ok(RouteMatch {
                    route,
                    params,
                    wildcard_args: Vec::new(),
                });
            }
            allowed.extend(template.routes.keys().copied());
        }

        if allowed.is_empty() {
            Err(ApiError::not_found(""))
        } else {
            Err(ApiError::method_not_allowed(allowed.into_iter().collect()))
        }
    }
}

fn pick(set: &RouteSet, method: HttpMethod) -> Option<Arc<Route>> {
    set.get(&method)
        .or_else(|| {
            (method == HttpMethod::Head)
                .then(|| set.get(&HttpMethod::Get))
                .flatten()
        })
        .cloned()
}

fn to_route_set(verbs: &VerbMap) -> RouteSet {
    verbs
        .iter()
        .map(|(method, route)| (*method, Arc::new(route.clone())))
        .collect()
}

/// Appends the empty-segment marker after a trailing slash and inside
/// doubled slashes.
fn mark_empty_segments(path: &str) -> String {
    let mut subject = path.replace("//", &format!("/{EMPTY_SEGMENT}/"));
    if subject.ends_with('/') {
        subject.push_str(EMPTY_SEGMENT);
    }
    subject
}

fn compile_template(template: &str, routes: RouteSet) -> Result<CompiledTemplate, RegistrationError> {
    let mut pattern = String::from("(?i)^");
    let mut numeric = Vec::new();
    let mut placeholders = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        pattern.push_str(&regex::escape(&rest[..start]));
        let end = rest[start..]
            .find('}')
            .map(|offset| start + offset)
            .ok_or_else(|| RegistrationError::Pattern {
                pattern: template.to_string(),
                reason: "unterminated placeholder".to_string(),
            })?;
        let name = &rest[start + 1..end];
        if name.starts_with('n') {
            numeric.push(name.to_string());
        }
        placeholders.push(name.to_string());
        pattern.push_str(&format!("(?P<{name}>[^/]+)"));
        rest = &rest[end + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|e| RegistrationError::Pattern {
        pattern: template.to_string(),
        reason: e.to_string(),
    })?;
    Ok(CompiledTemplate {
        regex,
        numeric,
        placeholders,
        routes,
    })
}

fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.parse::<f64>().is_ok_and(f64::is_finite)
}
