//! Route table builder.
//!
//! Turns resource signatures and their documentation into [`Route`]s. Each
//! routable method is processed in two passes: the first assigns parameter
//! sources that do not depend on the HTTP verb (`{@from}`, the full request
//! data name, object types, prefixing names); the second fixes the verb from
//! the method name or a `@url` directive and sends every parameter still
//! unassigned to the body (POST/PUT/PATCH) or the query (anything else).

use crate::descriptor::describe_param;
use crate::docblock::{DocBlock, UrlDirective};
use crate::model::ModelResolver;
use crate::table::RouteTable;
use crate::variants::{join_path, url_variants};
use hermes_core::signature::{MethodSignature, ResourceSignature, Visibility};
use hermes_core::{
    AccessLevel, Authenticator, CacheStore, HttpMethod, ParamSource, ParameterDescriptor,
    RegistrationError, Route, RouteMetadata, Settings, Target,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Builds a [`RouteTable`] from registered resources.
///
/// # Example
///
/// ```
/// use hermes_core::signature::{MethodSignature, ParamSignature, ResourceSignature};
/// use hermes_core::{HttpMethod, Settings};
/// use hermes_router::RouteTableBuilder;
///
/// let authors = ResourceSignature::new("Authors")
///     .method(MethodSignature::new("get").param(ParamSignature::new("id").typed("int")));
///
/// let table = RouteTableBuilder::new(&Settings::default())
///     .resource(None, authors)
///     .build()
///     .unwrap();
/// assert!(table.get(1, "authors/{n0}", HttpMethod::Get).is_some());
/// ```
pub struct RouteTableBuilder {
    settings: Settings,
    resources: Vec<(Option<String>, ResourceSignature)>,
    authenticators: Vec<Arc<dyn Authenticator>>,
    cache: Option<Arc<dyn CacheStore>>,
    models: ModelResolver,
}

impl std::fmt::Debug for RouteTableBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTableBuilder")
            .field("resources", &self.resources.len())
            .field("authenticators", &self.authenticators.len())
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl RouteTableBuilder {
    /// Creates a builder using the routing and versioning defaults of
    /// `settings`.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
            resources: Vec::new(),
            authenticators: Vec::new(),
            cache: None,
            models: ModelResolver::new(),
        }
    }

    /// Registers a resource under `prefix`.
    ///
    /// Without a prefix the resource path is the lower-cased short name of
    /// the resource. An empty prefix mounts it at the root.
    #[must_use]
    pub fn resource(mut self, prefix: Option<&str>, signature: ResourceSignature) -> Self {
        self.add_resource(prefix, signature);
        self
    }

    /// Registers a resource under `prefix`.
    pub fn add_resource(&mut self, prefix: Option<&str>, signature: ResourceSignature) {
        self.resources.push((prefix.map(ToString::to_string), signature));
    }

    /// Registers an authenticator. Routes list the authenticators that apply
    /// to their path, in registration order.
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticators.push(authenticator);
        self
    }

    /// Uses `cache` to load a previously built table and to store new ones,
    /// when route caching is enabled.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the table.
    ///
    /// # Errors
    ///
    /// Fails on malformed documentation, on `@url` directives naming unknown
    /// parameters, and on path sources given to parameters that cannot be
    /// path segments.
    pub fn build(mut self) -> Result<RouteTable, RegistrationError> {
        let (min, max) = (
            self.settings.api.min_version,
            self.settings.api.max_version,
        );
        let cache = self
            .cache
            .take()
            .filter(|_| self.settings.routing.cache_routes);
        if let Some(cache) = &cache {
            if let Some(table) = RouteTable::load(cache.as_ref(), min, max)? {
                info!(routes = table.len(), "route table loaded from cache");
                return Ok(table);
            }
        }

        let mut table = RouteTable::new(min, max);
        let resources = std::mem::take(&mut self.resources);
        for (_, signature) in &resources {
            for model in &signature.models {
                self.models.register(model.clone());
            }
        }
        for (prefix, signature) in &resources {
            let base = prefix
                .clone()
                .unwrap_or_else(|| default_resource_path(&signature.name));
            self.add_resource_routes(&mut table, base.trim_matches('/'), signature)?;
        }

        info!(
            routes = table.len(),
            resources = resources.len(),
            "route table built"
        );
        if let Some(cache) = &cache {
            table.save(cache.as_ref())?;
        }
        Ok(table)
    }

    fn add_resource_routes(
        &mut self,
        table: &mut RouteTable,
        base: &str,
        resource: &ResourceSignature,
    ) -> Result<(), RegistrationError> {
        let class_doc = DocBlock::parse(&resource.doc)
            .map_err(|e| RegistrationError::malformed_doc(&resource.name, None, e.to_string()))?;

        for method in resource.methods.iter().filter(|m| m.is_routable()) {
            let method_doc = DocBlock::parse(&method.doc).map_err(|e| {
                RegistrationError::malformed_doc(&resource.name, Some(&method.name), e.to_string())
            })?;
            let doc = DocBlock::merge(&class_doc, &method_doc);
            let plan = self.plan_method(base, resource, method, &doc)?;
            for route in plan {
                table.insert(route);
            }
        }
        Ok(())
    }

    /// Produces every route for one method, across all versions.
    fn plan_method(
        &mut self,
        base: &str,
        resource: &ResourceSignature,
        method: &MethodSignature,
        doc: &DocBlock,
    ) -> Result<Vec<Route>, RegistrationError> {
        let class = resource.name.as_str();
        let access_level = if method.visibility == Visibility::Protected {
            AccessLevel::ProtectedByVisibility
        } else {
            doc.access.unwrap_or_default()
        };

        let mut params = Vec::with_capacity(method.params.len());
        let mut assigned = Vec::with_capacity(method.params.len());
        for (index, signature) in method.params.iter().enumerate() {
            let param_doc = doc.param(&signature.name, index);
            let mut descriptor = describe_param(index, signature, param_doc, &mut self.models)?;
            let explicit = param_doc.and_then(|d| d.inline.from);
            let source = self.first_pass_source(&descriptor, explicit);
            if let Some(source) = explicit {
                if source == ParamSource::Path && !descriptor.is_path_eligible() {
                    return Err(RegistrationError::invalid_route(
                        class,
                        &method.name,
                        base,
                        format!(
                            "parameter `{}` cannot be read from the path",
                            descriptor.name
                        ),
                    ));
                }
                descriptor.explicit_source = true;
            }
            if let Some(source) = source {
                descriptor.source = source;
            }
            assigned.push(source.is_some());
            params.push(descriptor);
        }

        let metadata = RouteMetadata {
            description: doc.description.clone(),
            status: doc.status,
            headers: doc.headers.clone(),
            cache_control: doc.cache.clone(),
            expires: doc.expires,
            throttle_ms: doc.throttle,
            return_type: doc
                .return_type
                .clone()
                .or_else(|| method.return_type.clone()),
            tags: doc.tags.clone(),
        };
        let template = RouteTemplate {
            target: Target::new(class, &method.name),
            access_level,
            media_types: doc.formats.clone(),
            metadata,
        };

        let allow_ambiguity =
            !self.settings.routing.smart_auto_routing || doc.smart_auto_routing == Some(false);
        let shapes = if doc.urls.is_empty() {
            auto_shapes(base, &method.name, &params, &assigned, allow_ambiguity)
        } else {
            doc.urls
                .iter()
                .map(|directive| manual_shape(base, class, &method.name, directive, &params, &assigned))
                .collect::<Result<Vec<_>, _>>()?
        };

        let api = &self.settings.api;
        let min_version = doc.version.unwrap_or(api.min_version).max(api.min_version);
        let max_version = resource
            .max_version
            .map_or(api.max_version, |max| max.min(api.max_version));

        let mut routes = Vec::new();
        for version in min_version..=max_version {
            for shape in &shapes {
                let route = template.instantiate(shape, version, &self.authenticators);
                debug!(
                    version,
                    http.method = %route.http_method,
                    url = %route.display_path(),
                    route = %route.target,
                    access = %route.access_level,
                    "route registered"
                );
                routes.push(route);
            }
        }
        Ok(routes)
    }

    /// Sources decided before the verb is known.
    fn first_pass_source(
        &self,
        descriptor: &ParameterDescriptor,
        explicit: Option<ParamSource>,
    ) -> Option<ParamSource> {
        let routing = &self.settings.routing;
        if explicit.is_some() {
            explicit
        } else if descriptor.name == routing.full_request_data_name
            || descriptor.is_object_or_array()
        {
            Some(ParamSource::Body)
        } else if descriptor.is_path_eligible()
            && routing
                .prefixing_parameter_names
                .iter()
                .any(|name| *name == descriptor.name)
        {
            Some(ParamSource::Path)
        } else {
            None
        }
    }
}

/// The verb-independent part of a route.
struct RouteTemplate {
    target: Target,
    access_level: AccessLevel,
    media_types: Vec<String>,
    metadata: RouteMetadata,
}

impl RouteTemplate {
    fn instantiate(
        &self,
        shape: &RouteShape,
        version: u32,
        authenticators: &[Arc<dyn Authenticator>],
    ) -> Route {
        let auth_classes = authenticators
            .iter()
            .filter(|a| a.applies_to(&shape.url))
            .map(|a| a.name().to_string())
            .collect();
        Route {
            url_template: shape.url.clone(),
            http_method: shape.method,
            target: self.target.clone(),
            parameters: shape.parameters.clone(),
            access_level: self.access_level,
            auth_classes,
            request_media_types: self.media_types.clone(),
            response_media_types: self.media_types.clone(),
            api_version: version,
            wildcard: shape.wildcard,
            metadata: self.metadata.clone(),
        }
    }
}

/// One URL and verb with the parameter sources fixed for it.
#[derive(Debug, Clone)]
struct RouteShape {
    url: String,
    method: HttpMethod,
    wildcard: bool,
    parameters: Vec<ParameterDescriptor>,
}

/// Second pass: parameters without a source, and path parameters missing
/// from the URL, are read from the body or the query depending on the verb.
fn settle_sources(
    params: &[ParameterDescriptor],
    assigned: &[bool],
    in_url: &[usize],
    method: HttpMethod,
) -> Vec<ParameterDescriptor> {
    let fallback = if method.reads_body() {
        ParamSource::Body
    } else {
        ParamSource::Query
    };
    params
        .iter()
        .zip(assigned)
        .map(|(param, &assigned)| {
            let mut param = param.clone();
            if in_url.contains(&param.index) {
                param.source = ParamSource::Path;
                param.required = true;
            } else if !assigned || param.source == ParamSource::Path {
                param.source = fallback;
            }
            param
        })
        .collect()
}

fn auto_shapes(
    base: &str,
    method_name: &str,
    params: &[ParameterDescriptor],
    assigned: &[bool],
    allow_ambiguity: bool,
) -> Vec<RouteShape> {
    let (method, rest) = HttpMethod::strip_prefix(method_name).unwrap_or((HttpMethod::Get, method_name));
    let rest = rest.to_ascii_lowercase();
    let bases = match rest.as_str() {
        "" => vec![base.to_string()],
        "index" => vec![base.to_string(), join_path(base, "index")],
        _ => vec![join_path(base, &rest)],
    };

    let path_params: Vec<&ParameterDescriptor> = params
        .iter()
        .zip(assigned)
        .filter(|(p, &assigned)| assigned && p.source == ParamSource::Path)
        .map(|(p, _)| p)
        .collect();

    bases
        .iter()
        .flat_map(|url| url_variants(url, &path_params, allow_ambiguity))
        .map(|variant| RouteShape {
            parameters: settle_sources(params, assigned, &variant.path_params, method),
            url: variant.url,
            method,
            wildcard: false,
        })
        .collect()
}

fn manual_shape(
    base: &str,
    class: &str,
    method_name: &str,
    directive: &UrlDirective,
    params: &[ParameterDescriptor],
    assigned: &[bool],
) -> Result<RouteShape, RegistrationError> {
    let raw = directive.path.trim();
    let (raw, wildcard) = match raw.strip_suffix('*') {
        Some(prefix) => (prefix.trim_end_matches('/'), true),
        None => (raw, false),
    };
    let joined = join_path(base, raw);
    let invalid = |reason: String| {
        RegistrationError::invalid_route(class, method_name, &joined, reason)
    };

    let mut in_url = Vec::new();
    let mut segments = Vec::new();
    for segment in joined.split('/') {
        let name = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .or_else(|| segment.strip_prefix(':'));
        let Some(name) = name else {
            segments.push(segment.to_string());
            continue;
        };
        let name = name.trim_start_matches('$');
        let param = params
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| invalid(format!("unknown parameter `{name}` in url")))?;
        if !param.scalar || param.multiple {
            return Err(invalid(format!(
                "parameter `{name}` cannot be read from the path"
            )));
        }
        in_url.push(param.index);
        segments.push(param.placeholder());
    }

    Ok(RouteShape {
        url: segments.join("/").trim_end_matches('/').to_string(),
        method: directive.method,
        wildcard,
        parameters: settle_sources(params, assigned, &in_url, directive.method),
    })
}

/// Lower-cased short name: `App\Api\Authors` and `api::Authors` give `authors`.
fn default_resource_path(class: &str) -> String {
    class
        .rsplit(|c| matches!(c, '\\' | ':' | '/'))
        .next()
        .unwrap_or(class)
        .to_ascii_lowercase()
}
