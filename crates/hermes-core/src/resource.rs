//! The contract between the dispatcher and API classes.

use crate::context::{AuthOutcome, RequestContext};
use crate::error::{ApiError, ApiResult};
use crate::signature::ResourceSignature;
use bytes::Bytes;
use http_body_util::Full;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The HTTP response type produced by dispatch.
pub type Response = http::Response<Full<Bytes>>;

/// How the target method is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAccess {
    /// A public method, called normally.
    Normal,
    /// A protected method, called through an explicit accessibility override
    /// after authentication succeeded.
    Override,
}

/// One call of an API method with positional arguments.
#[derive(Debug)]
pub struct Invocation<'a> {
    method: &'a str,
    args: Vec<Value>,
    context: &'a RequestContext,
    access: CallAccess,
}

impl<'a> Invocation<'a> {
    /// Creates an invocation.
    #[must_use]
    pub fn new(
        method: &'a str,
        args: Vec<Value>,
        context: &'a RequestContext,
        access: CallAccess,
    ) -> Self {
        Self {
            method,
            args,
            context,
            access,
        }
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        self.method
    }

    /// Returns the arguments in signature order.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Deserializes the argument at `index`.
    ///
    /// A missing argument deserializes from `null`, so optional Rust types
    /// receive `None`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> ApiResult<T> {
        let value = self.args.get(index).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            ApiError::bad_request(format!("argument {index} of `{}`: {e}", self.method))
        })
    }

    /// Returns the request context.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        self.context
    }

    /// Returns how the method is reached.
    #[must_use]
    pub fn access(&self) -> CallAccess {
        self.access
    }

    /// Returns the authentication outcome.
    #[must_use]
    pub fn auth(&self) -> &AuthOutcome {
        self.context.auth()
    }

    /// Returns true if an authenticator accepted the request.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.context.is_authenticated()
    }
}

/// What an API method returns.
#[derive(Debug)]
pub enum Reply {
    /// A value to compose and encode with the negotiated format.
    Value(Value),
    /// A ready-made response. Route and CORS headers are added where the
    /// method did not set them.
    Response(Response),
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

/// An API class.
///
/// `signature` describes the routable surface once, at registration; `call`
/// runs one method with already bound and validated arguments.
///
/// # Example
///
/// ```
/// use hermes_core::signature::{MethodSignature, ParamSignature, ResourceSignature};
/// use hermes_core::{ApiError, ApiResult, BoxFuture, Invocation, Reply, Resource};
/// use serde_json::json;
///
/// struct Echo;
///
/// impl Resource for Echo {
///     fn signature(&self) -> ResourceSignature {
///         ResourceSignature::new("Echo")
///             .method(MethodSignature::new("get").param(ParamSignature::new("id").typed("int")))
///     }
///
///     fn call<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, ApiResult<Reply>> {
///         Box::pin(async move {
///             match invocation.method() {
///                 "get" => Ok(json!({ "id": invocation.arg::<i64>(0)? }).into()),
///                 other => Err(ApiError::not_found(format!("no method `{other}`"))),
///             }
///         })
///     }
/// }
/// ```
pub trait Resource: Send + Sync + 'static {
    /// Describes the class.
    fn signature(&self) -> ResourceSignature;

    /// Invokes a method.
    fn call<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, ApiResult<Reply>>;
}
