//! # Hermes
//!
//! **REST dispatch for annotated API classes**
//!
//! Hermes turns API classes into a versioned route table and runs each HTTP
//! request through a fixed lifecycle:
//!
//! ```text
//! Request → Route → Negotiate → Filters → Authenticate → Filters → Validate → Invoke
//!                                                                               ↓
//! Response ←──────────────────── Encode ← Compose ←─────────────────────────────┘
//! ```
//!
//! Classes describe themselves with a [`ResourceSignature`](core::signature::ResourceSignature):
//! methods, parameters and the documentation comments whose `@tags` carry
//! routing, access and validation metadata. Method names pick the verb
//! (`getByName` is `GET resource/byname`), required `id` parameters become
//! path segments and `@url` overrides both.
//!
//! ## Quick start
//!
//! ```rust
//! use hermes::prelude::*;
//! use hermes::core::signature::{MethodSignature, ParamSignature, ResourceSignature};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Authors;
//!
//! impl Resource for Authors {
//!     fn signature(&self) -> ResourceSignature {
//!         ResourceSignature::new("Authors").method(
//!             MethodSignature::new("get")
//!                 .doc("@param int $id {@min 1}")
//!                 .param(ParamSignature::new("id").typed("int")),
//!         )
//!     }
//!
//!     fn call<'a>(&'a self, call: Invocation<'a>) -> BoxFuture<'a, ApiResult<Reply>> {
//!         Box::pin(async move { Ok(json!({ "id": call.arg::<i64>(0)? }).into()) })
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! let dispatcher = Dispatcher::builder(config.settings())
//!     .resource(None, Arc::new(Authors))
//!     .build()?;
//! assert_eq!(dispatcher.routes().len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use hermes_core as core;

// Re-export the route table builder and matcher
pub use hermes_router as router;

// Re-export the request lifecycle
pub use hermes_dispatch as dispatch;

// Re-export configuration
pub use hermes_config as config;

// Re-export logging and metrics
pub use hermes_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use hermes::prelude::*;
/// ```
pub mod prelude {
    pub use hermes_core::{
        AccessLevel, ApiError, ApiResult, AuthOutcome, Authenticator, BoxFuture, CacheStore,
        Filter, HttpMethod, Invocation, Reply, RequestContext, Resource, SelectivePaths, Settings,
    };

    pub use hermes_dispatch::{
        DefaultValidator, Dispatcher, DispatcherBuilder, JsonFormat, MemoryCache, RateLimit,
        RateUnit,
    };

    pub use hermes_config::{ConfigError, ConfigLoader, HermesConfig};

    pub use hermes_telemetry::{init_logging, LogConfig};
}
