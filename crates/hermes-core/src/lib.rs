//! # Hermes Core
//!
//! Core types and collaborator contracts for the Hermes REST dispatch framework.
//!
//! This crate provides the value types shared by the route table builder, the
//! route matcher and the request lifecycle dispatcher:
//!
//! - [`ParameterDescriptor`] - One method parameter (type, source, constraints)
//! - [`Route`] - A `(version, url template, verb) -> (class, method)` binding
//! - [`RequestContext`] - Per-request mutable state carried through dispatch
//! - [`ApiError`] / [`RegistrationError`] - The error taxonomy
//! - [`Settings`] - Process-wide defaults, snapshotted per request
//!
//! It also defines the narrow contracts through which the core talks to its
//! collaborators: [`Format`], [`Authenticator`], [`Filter`], [`Validator`],
//! [`CacheStore`], [`Compose`] and [`Resource`].

#![doc(html_root_url = "https://docs.rs/hermes-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod cache;
mod compose;
mod context;
mod error;
mod filter;
mod format;
mod method;
mod param;
mod resource;
mod route;
mod settings;
pub mod signature;
mod validate;

pub use auth::{Authenticator, SelectivePaths};
pub use cache::CacheStore;
pub use compose::Compose;
pub use context::{AuthOutcome, NegotiatedFormat, RequestContext, RequestId, Stage};
pub use error::{ApiError, ApiResult, DebugInfo, ErrorBody, ErrorEnvelope, RegistrationError};
pub use filter::Filter;
pub use format::Format;
pub use method::HttpMethod;
pub use param::{derive_label, is_primitive_type, type_char, Constraints, ParamSource, ParameterDescriptor, ResolvedParameter};
pub use resource::{BoxFuture, CallAccess, Invocation, Reply, Resource, Response};
pub use route::{AccessLevel, Route, RouteMetadata, Target};
pub use settings::{ApiSettings, CorsSettings, NegotiationSettings, ResponseSettings, RoutingSettings, Settings};
pub use validate::Validator;
