//! Route table and matcher integration tests.
//!
//! These tests build tables from resource signatures the way an application
//! registers them, then resolve concrete paths against the compiled matcher.

use hermes_core::signature::{MethodSignature, ParamSignature, ResourceSignature};
use hermes_core::{HttpMethod, ParamSource, RoutingSettings, Settings};
use hermes_router::{placeholder_index, RouteMatcher, RouteTable, RouteTableBuilder};
use http::{HeaderMap, StatusCode};
use proptest::prelude::*;
use serde_json::{json, Map};

fn authors() -> ResourceSignature {
    ResourceSignature::new("Authors")
        .doc("Authors of the catalog.")
        .method(MethodSignature::new("index"))
        .method(
            MethodSignature::new("get")
                .doc("@param int $id author id {@min 1}")
                .param(ParamSignature::new("id").typed("int")),
        )
        .method(
            MethodSignature::new("put")
                .param(ParamSignature::new("id").typed("int"))
                .param(ParamSignature::new("name").typed("string")),
        )
        .method(
            MethodSignature::new("getByName")
                .doc("@url GET name/{name}")
                .param(ParamSignature::new("name").typed("string")),
        )
}

fn build(settings: &Settings, resources: Vec<ResourceSignature>) -> RouteTable {
    resources
        .into_iter()
        .fold(RouteTableBuilder::new(settings), |builder, r| {
            builder.resource(None, r)
        })
        .build()
        .unwrap()
}

/// Substitutes every placeholder in `template` with the value for its index.
fn fill(template: &str, values: &[String]) -> String {
    template
        .split('/')
        .map(|segment| {
            segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .and_then(placeholder_index)
                .map_or_else(|| segment.to_string(), |i| values[i].clone())
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[test]
fn get_resource_by_id_binds_numeric_argument() {
    let table = build(&Settings::default(), vec![authors()]);
    let matcher = RouteMatcher::new(&table).unwrap();

    let found = matcher.find("/authors/42", HttpMethod::Get, 1).unwrap();
    assert_eq!(found.route.target.to_string(), "Authors::get");

    let bound = found.bind(&Map::new(), &HeaderMap::new(), &RoutingSettings::default());
    let args: Vec<_> = bound.iter().map(|p| p.value_or_default()).collect();
    assert_eq!(args, vec![json!(42)]);

    let index = matcher.find("authors", HttpMethod::Get, 1).unwrap();
    assert_eq!(index.route.target.method_name, "index");
}

#[test]
fn required_id_is_not_reachable_without_it() {
    let table = build(
        &Settings::default(),
        vec![ResourceSignature::new("Resource")
            .method(MethodSignature::new("get").param(ParamSignature::new("id")))],
    );
    let matcher = RouteMatcher::new(&table).unwrap();
    assert!(matcher.find("resource/42", HttpMethod::Get, 1).is_ok());
    let err = matcher.find("resource", HttpMethod::Get, 1).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
}

#[test]
fn verb_mismatch_lists_allowed_methods() {
    let table = build(&Settings::default(), vec![authors()]);
    let matcher = RouteMatcher::new(&table).unwrap();

    let err = matcher.find("authors/5", HttpMethod::Delete, 1).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        err.allowed_methods(),
        Some(&[HttpMethod::Get, HttpMethod::Put][..])
    );
}

#[test]
fn numeric_placeholder_rejects_text() {
    let table = build(&Settings::default(), vec![authors()]);
    let matcher = RouteMatcher::new(&table).unwrap();

    let err = matcher.find("authors/abc", HttpMethod::Get, 1).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

    let found = matcher.find("authors/name/abc", HttpMethod::Get, 1).unwrap();
    assert_eq!(found.route.target.method_name, "getByName");
    assert_eq!(found.params.get(0), Some("abc"));
}

#[test]
fn put_reads_leftover_parameters_from_body() {
    let table = build(&Settings::default(), vec![authors()]);
    let route = table.get(1, "authors/{n0}", HttpMethod::Put).unwrap();
    assert_eq!(route.parameters[0].source, ParamSource::Path);
    assert_eq!(route.parameters[1].source, ParamSource::Body);

    let matcher = RouteMatcher::new(&table).unwrap();
    let found = matcher.find("authors/7", HttpMethod::Put, 1).unwrap();
    let mut data = Map::new();
    data.insert("name".to_string(), json!("Ursula"));
    let bound = found.bind(&data, &HeaderMap::new(), &RoutingSettings::default());
    assert_eq!(bound[0].value, Some(json!(7)));
    assert_eq!(bound[1].value, Some(json!("Ursula")));
}

#[test]
fn later_registration_overwrites_earlier() {
    let first = ResourceSignature::new("Authors").method(MethodSignature::new("index"));
    let second = ResourceSignature::new("Writers").method(
        MethodSignature::new("list").doc("@url GET /"),
    );
    let table = RouteTableBuilder::new(&Settings::default())
        .resource(None, first)
        .resource(Some("authors"), second)
        .build()
        .unwrap();
    let route = table.get(1, "authors", HttpMethod::Get).unwrap();
    assert_eq!(route.target.to_string(), "Writers::list");
}

#[test]
fn version_outside_range_is_not_found() {
    let mut settings = Settings::default();
    settings.api.max_version = 2;
    let table = build(&settings, vec![authors()]);
    let matcher = RouteMatcher::new(&table).unwrap();

    assert!(matcher.find("authors/1", HttpMethod::Get, 2).is_ok());
    let err = matcher.find("authors/1", HttpMethod::Get, 3).unwrap_err();
    assert_eq!(err.error_message(), "Not Found: Version 3 is not supported");
}

/// A method whose parameters are all read from the path, typed by `numeric`.
fn path_only_resource(numeric: &[bool]) -> ResourceSignature {
    let mut doc = String::new();
    let mut method = MethodSignature::new("getItem");
    for (i, &is_numeric) in numeric.iter().enumerate() {
        let type_name = if is_numeric { "int" } else { "string" };
        doc.push_str(&format!("@param {type_name} $p{i} {{@from path}}\n"));
        method = method.param(ParamSignature::new(format!("p{i}")).typed(type_name));
    }
    ResourceSignature::new("Items").method(method.doc(doc))
}

fn segment_values(numeric: Vec<bool>) -> impl Strategy<Value = (Vec<bool>, Vec<String>)> {
    let values: Vec<BoxedStrategy<String>> = numeric
        .iter()
        .map(|&is_numeric| {
            if is_numeric {
                any::<u32>().prop_map(|n| n.to_string()).boxed()
            } else {
                "[a-z][a-z_-]{0,11}".boxed()
            }
        })
        .collect();
    (Just(numeric), values)
}

proptest! {
    #[test]
    fn filled_template_resolves_to_its_route(
        (numeric, values) in prop::collection::vec(any::<bool>(), 1..5).prop_flat_map(segment_values)
    ) {
        let table = build(&Settings::default(), vec![path_only_resource(&numeric)]);
        let matcher = RouteMatcher::new(&table).unwrap();

        for route in table.routes() {
            let path = fill(&route.url_template, &values);
            let found = matcher.find(&path, route.http_method, route.api_version).unwrap();
            prop_assert_eq!(&found.route.url_template, &route.url_template);
            prop_assert_eq!(&found.route.target, &route.target);
            for (i, value) in values.iter().enumerate() {
                prop_assert_eq!(found.params.get(i), Some(value.as_str()));
            }
        }
    }

    #[test]
    fn building_twice_yields_identical_tables(
        smart in any::<bool>(),
        max_version in 1u32..4,
    ) {
        let mut settings = Settings::default();
        settings.routing.smart_auto_routing = smart;
        settings.api.max_version = max_version;

        let first = build(&settings, vec![authors(), path_only_resource(&[true, false])]);
        let second = build(&settings, vec![authors(), path_only_resource(&[true, false])]);
        prop_assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }
}
