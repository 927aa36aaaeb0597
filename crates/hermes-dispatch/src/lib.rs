//! Request lifecycle dispatcher for Hermes.
//!
//! The [`Dispatcher`] takes an HTTP request, resolves it through the route
//! table built from registered resources, and walks it through negotiation,
//! filters, authentication, validation and invocation to a composed
//! response.
//!
//! Besides the dispatcher this crate ships the stock collaborators:
//!
//! - [`JsonFormat`] and [`UrlEncodedFormat`] wire formats
//! - [`DefaultValidator`] type coercion and constraint checks
//! - [`DefaultCompose`] response envelope
//! - [`RateLimit`] filter and the [`MemoryCache`] store it counts in
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use hermes_core::signature::{MethodSignature, ParamSignature, ResourceSignature};
//! use hermes_core::{ApiResult, BoxFuture, Invocation, Reply, Resource, Settings};
//! use hermes_dispatch::Dispatcher;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Authors;
//!
//! impl Resource for Authors {
//!     fn signature(&self) -> ResourceSignature {
//!         ResourceSignature::new("Authors")
//!             .method(MethodSignature::new("get").param(ParamSignature::new("id").typed("int")))
//!     }
//!
//!     fn call<'a>(&'a self, call: Invocation<'a>) -> BoxFuture<'a, ApiResult<Reply>> {
//!         Box::pin(async move { Ok(json!({ "id": call.arg::<i64>(0)? }).into()) })
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let dispatcher = Dispatcher::builder(Settings::default())
//!     .resource(None, Arc::new(Authors))
//!     .build()
//!     .unwrap();
//!
//! let request = http::Request::get("/authors/42").body(Bytes::new()).unwrap();
//! let response = dispatcher.dispatch(request).await;
//! assert_eq!(response.status(), http::StatusCode::OK);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-dispatch/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod cache;
mod compose;
mod cors;
mod dispatcher;
mod filters;
mod format;
pub mod negotiate;
mod rate_limit;
mod response;
mod validator;

pub use cache::MemoryCache;
pub use compose::DefaultCompose;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use format::{FormatRegistry, JsonFormat, UrlEncodedFormat};
pub use rate_limit::{headers as rate_limit_headers, RateLimit, RateUnit};
pub use validator::DefaultValidator;
