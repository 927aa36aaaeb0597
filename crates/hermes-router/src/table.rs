//! The version-partitioned route table.
//!
//! `version -> url template -> verb -> Route`, with wildcard routes kept in a
//! separate partition keyed by their prefix. Every level is ordered, so a
//! table serializes identically however often it is rebuilt from the same
//! input.

use hermes_core::{CacheStore, HttpMethod, RegistrationError, Route};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Routes of one path, by verb.
pub type VerbMap = BTreeMap<HttpMethod, Route>;

/// Routes registered under one API version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionRoutes {
    /// Static and templated routes by URL template.
    pub routes: BTreeMap<String, VerbMap>,
    /// Catch-all routes by prefix.
    #[serde(rename = "*", default)]
    pub wildcard: BTreeMap<String, VerbMap>,
}

/// All registered routes.
///
/// # Example
///
/// ```
/// use hermes_core::{AccessLevel, HttpMethod, Route, RouteMetadata, Target};
/// use hermes_router::RouteTable;
///
/// let mut table = RouteTable::new(1, 1);
/// table.insert(Route {
///     url_template: "authors".to_string(),
///     http_method: HttpMethod::Get,
///     target: Target::new("Authors", "index"),
///     parameters: vec![],
///     access_level: AccessLevel::Public,
///     auth_classes: vec![],
///     request_media_types: vec![],
///     response_media_types: vec![],
///     api_version: 1,
///     wildcard: false,
///     metadata: RouteMetadata::default(),
/// });
/// assert!(table.get(1, "authors", HttpMethod::Get).is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    min_version: u32,
    max_version: u32,
    versions: BTreeMap<u32, VersionRoutes>,
}

impl RouteTable {
    /// Creates an empty table for versions `min..=max`.
    #[must_use]
    pub fn new(min_version: u32, max_version: u32) -> Self {
        Self {
            min_version,
            max_version,
            versions: BTreeMap::new(),
        }
    }

    /// Lowest version.
    #[must_use]
    pub fn min_version(&self) -> u32 {
        self.min_version
    }

    /// Highest version.
    #[must_use]
    pub fn max_version(&self) -> u32 {
        self.max_version
    }

    /// Registers a route, replacing any route with the same version,
    /// template and verb. Returns the replaced route.
    pub fn insert(&mut self, route: Route) -> Option<Route> {
        let version = self.versions.entry(route.api_version).or_default();
        let partition = if route.wildcard {
            &mut version.wildcard
        } else {
            &mut version.routes
        };
        let previous = partition
            .entry(route.url_template.clone())
            .or_default()
            .insert(route.http_method, route);
        if let Some(previous) = &previous {
            debug!(
                version = previous.api_version,
                url = %previous.url_template,
                http.method = %previous.http_method,
                target = %previous.target,
                "route replaced by later registration"
            );
        }
        previous
    }

    /// Returns the routes of `version`.
    #[must_use]
    pub fn version(&self, version: u32) -> Option<&VersionRoutes> {
        self.versions.get(&version)
    }

    /// Looks up a static or templated route by its exact template.
    #[must_use]
    pub fn get(&self, version: u32, url_template: &str, method: HttpMethod) -> Option<&Route> {
        self.versions
            .get(&version)?
            .routes
            .get(url_template)?
            .get(&method)
    }

    /// Iterates over every route in table order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.versions.values().flat_map(|v| {
            v.routes
                .values()
                .chain(v.wildcard.values())
                .flat_map(BTreeMap::values)
        })
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes().count()
    }

    /// Returns true if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes().next().is_none()
    }

    /// Serializes the table to JSON.
    pub fn to_json(&self) -> Result<String, RegistrationError> {
        serde_json::to_string(self).map_err(|e| RegistrationError::Cache(e.to_string()))
    }

    /// Parses a table serialized with [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self, RegistrationError> {
        serde_json::from_str(json).map_err(|e| RegistrationError::Cache(e.to_string()))
    }

    /// Cache key for a table covering `min..=max`.
    #[must_use]
    pub fn cache_key(min_version: u32, max_version: u32) -> String {
        format!("routes-v{min_version}-v{max_version}")
    }

    /// Stores the table in `cache`.
    pub fn save(&self, cache: &dyn CacheStore) -> Result<(), RegistrationError> {
        let value =
            serde_json::to_value(self).map_err(|e| RegistrationError::Cache(e.to_string()))?;
        cache.set(&Self::cache_key(self.min_version, self.max_version), value);
        debug!(routes = self.len(), "route table cached");
        Ok(())
    }

    /// Loads a table for `min..=max` from `cache`, if one was stored.
    pub fn load(
        cache: &dyn CacheStore,
        min_version: u32,
        max_version: u32,
    ) -> Result<Option<Self>, RegistrationError> {
        cache
            .get(&Self::cache_key(min_version, max_version))
            .map(|value| {
                serde_json::from_value(value).map_err(|e| RegistrationError::Cache(e.to_string()))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{AccessLevel, RouteMetadata, Target};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::HashMap;

    fn route(url: &str, method: HttpMethod, target: &str, wildcard: bool) -> Route {
        Route {
            url_template: url.to_string(),
            http_method: method,
            target: Target::new("Authors", target),
            parameters: Vec::new(),
            access_level: AccessLevel::Public,
            auth_classes: Vec::new(),
            request_media_types: Vec::new(),
            response_media_types: Vec::new(),
            api_version: 1,
            wildcard,
            metadata: RouteMetadata::default(),
        }
    }

    #[derive(Default)]
    struct MapCache(Mutex<HashMap<String, Value>>);

    impl CacheStore for MapCache {
        fn get(&self, key: &str) -> Option<Value> {
            self.0.lock().get(key).cloned()
        }
        fn set(&self, key: &str, value: Value) {
            self.0.lock().insert(key.to_string(), value);
        }
        fn clear(&self, key: &str) {
            self.0.lock().remove(key);
        }
    }

    #[test]
    fn test_last_write_wins() {
        let mut table = RouteTable::new(1, 1);
        assert!(table
            .insert(route("authors", HttpMethod::Get, "first", false))
            .is_none());
        let replaced = table.insert(route("authors", HttpMethod::Get, "second", false));
        assert_eq!(replaced.map(|r| r.target.method_name), Some("first".to_string()));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table
                .get(1, "authors", HttpMethod::Get)
                .map(|r| r.target.method_name.as_str()),
            Some("second")
        );
    }

    #[test]
    fn test_wildcard_partition() {
        let mut table = RouteTable::new(1, 1);
        table.insert(route("files", HttpMethod::Get, "serve", true));
        assert!(table.get(1, "files", HttpMethod::Get).is_none());
        assert!(table.version(1).unwrap().wildcard.contains_key("files"));
        let json = table.to_json().unwrap();
        assert!(json.contains("\"*\""));
    }

    #[test]
    fn test_json_roundtrip_is_stable() {
        let mut table = RouteTable::new(1, 2);
        table.insert(route("b", HttpMethod::Post, "b", false));
        table.insert(route("a", HttpMethod::Get, "a", false));
        let json = table.to_json().unwrap();
        let parsed = RouteTable::from_json(&json).unwrap();
        assert_eq!(parsed, table);
        assert_eq!(parsed.to_json().unwrap(), json);
    }

    #[test]
    fn test_cache_persistence() {
        let cache = MapCache::default();
        assert!(RouteTable::load(&cache, 1, 2).unwrap().is_none());

        let mut table = RouteTable::new(1, 2);
        table.insert(route("authors", HttpMethod::Get, "index", false));
        table.save(&cache).unwrap();
        assert!(cache.contains("routes-v1-v2"));

        let loaded = RouteTable::load(&cache, 1, 2).unwrap().unwrap();
        assert_eq!(loaded, table);
    }
}
