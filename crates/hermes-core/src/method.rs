//! HTTP verbs understood by the route table.
//!
//! [`HttpMethod`] is a closed, ordered set so route tables keyed by verb
//! serialize deterministically and `Allow` headers list verbs in a stable order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An HTTP verb a route can be registered for.
///
/// # Example
///
/// ```
/// use hermes_core::HttpMethod;
///
/// assert_eq!(HttpMethod::strip_prefix("getAuthor"), Some((HttpMethod::Get, "Author")));
/// assert_eq!("delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
}

impl HttpMethod {
    /// All verbs, in table order.
    pub const ALL: [HttpMethod; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
    ];

    /// Returns the canonical upper-case token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Parses a verb token case-insensitively.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(token))
    }

    /// Splits a leading verb token off a method name.
    ///
    /// `getAuthor` yields `(Get, "Author")`, `post` yields `(Post, "")`.
    /// Names that do not start with a verb return `None`.
    #[must_use]
    pub fn strip_prefix(name: &str) -> Option<(Self, &str)> {
        Self::ALL.into_iter().find_map(|m| {
            let token = m.as_str();
            let head = name.get(..token.len())?;
            head.eq_ignore_ascii_case(token)
                .then(|| (m, &name[token.len()..]))
        })
    }

    /// Returns true for verbs whose leftover parameters are read from the body.
    #[must_use]
    pub const fn reads_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| format!("unsupported HTTP method `{s}`"))
    }
}

impl TryFrom<&http::Method> for HttpMethod {
    type Error = String;

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
            HttpMethod::Head => Self::HEAD,
            HttpMethod::Options => Self::OPTIONS,
        }
    }
}
