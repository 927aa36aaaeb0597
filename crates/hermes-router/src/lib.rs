//! Route table builder and route matcher for Hermes.
//!
//! Registration turns resource signatures and their documentation into a
//! version-partitioned [`RouteTable`]; the [`RouteMatcher`] compiled from it
//! resolves request paths at dispatch time.
//!
//! # Features
//!
//! - **Auto-routing**: verbs and URLs inferred from method names and
//!   parameter lists (`getLatest` -> `GET authors/latest`)
//! - **Manual routes**: `@url VERB path` directives with `{name}` or `:name`
//!   placeholders, and `prefix/*` wildcards
//! - **Typed placeholders**: `{n0}` only matches numeric segments, `{s1}`
//!   matches anything but `/`
//! - **Versioning**: each route is registered for every version it supports
//!
//! # Example
//!
//! ```rust
//! use hermes_core::signature::{MethodSignature, ParamSignature, ResourceSignature};
//! use hermes_core::{HttpMethod, Settings};
//! use hermes_router::{RouteMatcher, RouteTableBuilder};
//!
//! let authors = ResourceSignature::new("Authors")
//!     .method(MethodSignature::new("index"))
//!     .method(MethodSignature::new("get").param(ParamSignature::new("id").typed("int")));
//!
//! let table = RouteTableBuilder::new(&Settings::default())
//!     .resource(None, authors)
//!     .build()
//!     .unwrap();
//! let matcher = RouteMatcher::new(&table).unwrap();
//!
//! let found = matcher.find("authors/42", HttpMethod::Get, 1).unwrap();
//! assert_eq!(found.route.target.method_name, "get");
//! assert_eq!(found.params.value(0), Some(serde_json::json!(42)));
//!
//! let err = matcher.find("authors/42", HttpMethod::Delete, 1).unwrap_err();
//! assert_eq!(err.status_code(), http::StatusCode::METHOD_NOT_ALLOWED);
//! ```
//!
//! # Match order
//!
//! ```text
//!   path ──► static key ──► wildcard prefixes ──► templates (ascending)
//!              │                 │ longest first        │ numeric check
//!              ▼                 ▼                      ▼
//!            Route             Route + args           Route + params
//!
//!   no match: 405 if another verb matched the path, otherwise 404
//! ```

mod builder;
mod descriptor;
mod docblock;
mod matcher;
mod model;
mod params;
mod table;
mod variants;

pub use builder::RouteTableBuilder;
pub use docblock::{DocBlock, DocError, InlineTags, ParamDoc, UrlDirective};
pub use matcher::{RouteMatch, RouteMatcher};
pub use model::ModelResolver;
pub use params::{placeholder_index, PathParams};
pub use table::{RouteTable, VerbMap, VersionRoutes};
pub use variants::{join_path, url_variants, UrlVariant};
