//! Content negotiation.
//!
//! The response format is chosen, in order, from:
//!
//! 1. the route's own format restriction, when it names a single format;
//! 2. a file extension on the request path (`authors/1.json`);
//! 3. the `Accept` header, highest quality first, vendor media types
//!    included;
//! 4. a `*/*` entry, which selects the default format.
//!
//! Charset and language follow the same priority-list pattern against the
//! configured supported values.

use crate::format::{essence, FormatRegistry};
use hermes_core::{ApiError, ApiResult, Format, NegotiatedFormat, RequestContext};
use http::header::{ACCEPT, ACCEPT_CHARSET, ACCEPT_LANGUAGE};
use std::cmp::Ordering;
use std::sync::Arc;

/// Splits a priority header (`Accept`, `Accept-Charset`, ...) into its
/// values, best first.
///
/// Entries without a `q` parameter have quality 1; ties keep header order;
/// entries with `q=0` are dropped.
///
/// ```
/// use hermes_dispatch::negotiate::priority_list;
///
/// let list = priority_list("text/html;q=0.5, application/json, */*;q=0.1");
/// assert_eq!(list, ["application/json", "text/html", "*/*"]);
/// ```
#[must_use]
pub fn priority_list(header: &str) -> Vec<String> {
    let mut items: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|item| {
            let mut parts = item.split(';');
            let value = parts.next()?.trim();
            if value.is_empty() {
                return None;
            }
            let quality = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((value.to_string(), quality))
        })
        .filter(|(_, q)| *q > 0.0)
        .collect();
    items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    items.into_iter().map(|(value, _)| value).collect()
}

/// A parsed `application/vnd.{vendor}[-v{N}]+{ext}` media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorMime {
    /// Requested API version, if the media type carries one.
    pub version: Option<u32>,
    /// Extension of the underlying format.
    pub extension: String,
}

/// Parses a vendor media type for `vendor`.
///
/// ```
/// use hermes_dispatch::negotiate::parse_vendor_mime;
///
/// let vendor = parse_vendor_mime("application/vnd.acme-v2+json", "acme").unwrap();
/// assert_eq!(vendor.version, Some(2));
/// assert_eq!(vendor.extension, "json");
/// assert!(parse_vendor_mime("application/json", "acme").is_none());
/// ```
#[must_use]
pub fn parse_vendor_mime(mime: &str, vendor: &str) -> Option<VendorMime> {
    let mime = essence(mime);
    let rest = mime.strip_prefix("application/vnd.")?;
    let rest = rest.strip_prefix(&vendor.to_ascii_lowercase())?;
    let (tag, extension) = rest.split_once('+')?;
    let version = match tag {
        "" => None,
        tag => Some(tag.strip_prefix("-v")?.parse().ok()?),
    };
    (!extension.is_empty()).then(|| VendorMime {
        version,
        extension: extension.to_string(),
    })
}

/// Builds the vendor media type echoed in `Content-Type`.
#[must_use]
pub fn vendor_mime(vendor: &str, version: u32, extension: &str) -> String {
    format!("application/vnd.{vendor}-v{version}+{extension}")
}

/// The API version requested through a vendor media type in `Accept`.
#[must_use]
pub fn requested_version(ctx: &RequestContext) -> Option<u32> {
    let api = &ctx.settings().api;
    if !api.use_vendor_mime_versioning {
        return None;
    }
    let vendor = api.vendor.as_deref()?;
    priority_list(ctx.header(ACCEPT.as_str())?)
        .iter()
        .find_map(|mime| parse_vendor_mime(mime, vendor).and_then(|v| v.version))
}

/// Chooses the response format, charset and language for `ctx`.
///
/// `extension` is the file extension stripped from the path, if any.
pub fn negotiate(
    ctx: &mut RequestContext,
    formats: &FormatRegistry,
    extension: Option<&str>,
) -> ApiResult<()> {
    let (format, vary) = response_format(ctx, formats, extension)?;
    ctx.set_format(format);
    ctx.set_vary_accept(vary);
    negotiate_charset(ctx)?;
    negotiate_language(ctx)?;
    Ok(())
}

/// Chooses the response format. The flag is true when `Accept` decided it.
pub fn response_format(
    ctx: &RequestContext,
    formats: &FormatRegistry,
    extension: Option<&str>,
) -> ApiResult<(NegotiatedFormat, bool)> {
    let restricted = ctx
        .route()
        .map(|route| route.response_media_types.as_slice())
        .unwrap_or_default();
    let eligible: Vec<&Arc<dyn Format>> = if restricted.is_empty() {
        formats.iter().collect()
    } else {
        restricted
            .iter()
            .filter_map(|mime| formats.by_mime(mime))
            .collect()
    };
    let Some(&default) = eligible.first() else {
        return Err(ApiError::not_acceptable(
            "Content negotiation failed. No format is registered",
        ));
    };
    let chosen = |format: &Arc<dyn Format>| NegotiatedFormat::new(format.mime(), format.extension());

    if !restricted.is_empty() && eligible.len() == 1 {
        return Ok((chosen(default), false));
    }

    if let Some(extension) = extension {
        return eligible
            .iter()
            .find(|f| f.extension().eq_ignore_ascii_case(extension))
            .map(|f| (chosen(f), false))
            .ok_or_else(|| {
                ApiError::not_acceptable(format!(
                    "Content negotiation failed. Try `{}` instead.",
                    default.mime()
                ))
            });
    }

    let Some(accept) = ctx.header(ACCEPT.as_str()).filter(|a| !a.trim().is_empty()) else {
        return Ok((chosen(default), false));
    };

    let api = &ctx.settings().api;
    for mime in priority_list(accept) {
        let lower = mime.to_ascii_lowercase();
        if let Some(vendor) = api.vendor.as_deref() {
            if let Some(parsed) = parse_vendor_mime(&lower, vendor) {
                if let Some(format) = eligible
                    .iter()
                    .find(|f| f.extension().eq_ignore_ascii_case(&parsed.extension))
                {
                    let mut negotiated = chosen(format);
                    negotiated.vendor_mime =
                        Some(vendor_mime(vendor, ctx.version(), format.extension()));
                    return Ok((negotiated, true));
                }
                continue;
            }
        }
        if let Some(format) = eligible.iter().find(|f| {
            f.supported_media_types()
                .keys()
                .any(|m| m.eq_ignore_ascii_case(&essence(&lower)))
        }) {
            return Ok((chosen(format), true));
        }
        match essence(&lower).as_str() {
            "*/*" => return Ok((chosen(default), true)),
            "application/*" => {
                let format = eligible
                    .iter()
                    .find(|f| f.mime() == "application/json")
                    .or_else(|| eligible.iter().find(|f| f.mime().starts_with("application/")));
                if let Some(format) = format {
                    return Ok((chosen(format), true));
                }
            }
            _ => {}
        }
    }

    Err(ApiError::not_acceptable(format!(
        "Content negotiation failed. Try `{}` instead.",
        default.mime()
    )))
}

fn negotiate_charset(ctx: &mut RequestContext) -> ApiResult<()> {
    let supported = ctx.settings().negotiation.supported_charsets.clone();
    let chosen = pick(
        ctx.header(ACCEPT_CHARSET.as_str()),
        &supported,
        |requested, candidate| requested.eq_ignore_ascii_case(candidate),
    )
    .map_err(|()| {
        ApiError::not_acceptable("Content negotiation failed. Requested charset is not supported")
    })?;
    if let Some(charset) = chosen {
        ctx.set_charset(charset);
    }
    Ok(())
}

fn negotiate_language(ctx: &mut RequestContext) -> ApiResult<()> {
    let supported = ctx.settings().negotiation.supported_languages.clone();
    let chosen = pick(
        ctx.header(ACCEPT_LANGUAGE.as_str()),
        &supported,
        |requested, candidate| {
            requested.eq_ignore_ascii_case(candidate)
                || requested
                    .split('-')
                    .next()
                    .is_some_and(|primary| primary.eq_ignore_ascii_case(candidate))
        },
    )
    .map_err(|()| {
        ApiError::not_acceptable("Content negotiation failed. Requested language is not supported")
    })?;
    if let Some(language) = chosen {
        ctx.set_language(language);
    }
    Ok(())
}

/// Picks the first supported value of a priority header.
///
/// `Ok(None)` keeps the default: no header, or no match but the header
/// contains a wildcard. `Err` means only unsupported values were asked for.
fn pick(
    header: Option<&str>,
    supported: &[String],
    matches: impl Fn(&str, &str) -> bool,
) -> Result<Option<String>, ()> {
    let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
        return Ok(None);
    };
    for requested in priority_list(header) {
        if requested == "*" {
            return Ok(None);
        }
        if let Some(found) = supported.iter().find(|s| matches(&requested, s)) {
            return Ok(Some(found.clone()));
        }
    }
    if header.contains('*') {
        Ok(None)
    } else {
        Err(())
    }
}
