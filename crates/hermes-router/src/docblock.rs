//! Documentation metadata extractor.
//!
//! API classes attach documentation text to themselves, their methods and
//! their model properties. [`DocBlock::parse`] turns that text into a typed
//! tree; [`DocBlock::merge`] overlays a method block on its class block.
//!
//! ```text
//! /**
//!  * Fetch one author.
//!  *
//!  * @param int $id author id {@from path} {@min 1}
//!  * @param string $fields comma separated list {@choice name,email}
//!  * @access hybrid
//!  * @expires 60
//!  */
//! ```
//!
//! Block tags start a line with `@name`; inline tags appear anywhere inside
//! a block tag as `{@name value}`. Unknown block tags are preserved verbatim.

use hermes_core::{AccessLevel, HttpMethod, ParamSource};
use std::collections::BTreeMap;
use thiserror::Error;

/// A documentation block that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DocError(String);

impl DocError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A manual route directive: `@url VERB path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlDirective {
    /// Verb to register.
    pub method: HttpMethod,
    /// Path relative to the resource path, possibly ending in `*`.
    pub path: String,
}

/// Inline `{@name value}` tags of a `@param` or `@var` line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineTags {
    /// `{@from path|query|body|header}`
    pub from: Option<ParamSource>,
    /// `{@min n}`
    pub min: Option<f64>,
    /// `{@max n}`
    pub max: Option<f64>,
    /// `{@choice a,b,c}`
    pub choice: Option<Vec<String>>,
    /// `{@pattern /regex/}`
    pub pattern: Option<String>,
    /// `{@fix true}`
    pub fix: Option<bool>,
    /// `{@type email|date|datetime|timestamp}`
    pub format: Option<String>,
    /// `{@label Text}`
    pub label: Option<String>,
    /// `{@validate false}`
    pub validate: Option<bool>,
    /// `{@required}`
    pub required: Option<bool>,
    /// `{@message text}`
    pub message: Option<String>,
    /// Inline tags without a dedicated field.
    pub other: BTreeMap<String, String>,
}

/// A `@param` or `@var` line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamDoc {
    /// Declared type.
    pub type_name: Option<String>,
    /// Parameter name without the `$` sigil.
    pub name: Option<String>,
    /// Free text after the name.
    pub description: String,
    /// Inline tags.
    pub inline: InlineTags,
}

/// Parsed documentation of a class, method or property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocBlock {
    /// Text before the first tag.
    pub description: String,
    /// `@param` lines in order.
    pub params: Vec<ParamDoc>,
    /// `@var` line of a model property.
    pub var: Option<ParamDoc>,
    /// `@return type`
    pub return_type: Option<String>,
    /// `@url VERB path` directives in order.
    pub urls: Vec<UrlDirective>,
    /// `@access public|hybrid|protected`, or `@protected`.
    pub access: Option<AccessLevel>,
    /// `@smart-auto-routing true|false`
    pub smart_auto_routing: Option<bool>,
    /// `@status code`
    pub status: Option<u16>,
    /// `@header Name: value` lines.
    pub headers: Vec<(String, String)>,
    /// `@cache directive`
    pub cache: Option<String>,
    /// `@expires seconds`
    pub expires: Option<u64>,
    /// `@throttle ms`
    pub throttle: Option<u64>,
    /// `@format mime[,mime]`
    pub formats: Vec<String>,
    /// `@version n`, the minimum version the method is available in.
    pub version: Option<u32>,
    /// Every other block tag, by name.
    pub tags: BTreeMap<String, Vec<String>>,
}

impl DocBlock {
    /// Parses documentation text.
    ///
    /// Accepts raw text as well as `/** ... */` comments with leading `*`.
    ///
    /// ```
    /// use hermes_router::DocBlock;
    ///
    /// let doc = DocBlock::parse("@param int $id {@from path}\n@status 201").unwrap();
    /// assert_eq!(doc.status, Some(201));
    /// assert_eq!(doc.params[0].name.as_deref(), Some("id"));
    /// ```
    pub fn parse(text: &str) -> Result<Self, DocError> {
        let mut doc = Self::default();
        let mut description = Vec::new();
        let mut current: Option<(String, String)> = None;

        for line in strip_comment(text) {
            if let Some(rest) = line.strip_prefix('@') {
                if let Some((name, value)) = current.take() {
                    doc.apply(&name, &value)?;
                }
                let (name, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                current = Some((name.to_string(), value.trim().to_string()));
            } else if let Some((_, value)) = current.as_mut() {
                if !line.is_empty() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(&line);
                }
            } else {
                description.push(line);
            }
        }
        if let Some((name, value)) = current.take() {
            doc.apply(&name, &value)?;
        }
        doc.description = description.join("\n").trim().to_string();
        Ok(doc)
    }

    /// Overlays a method block on its class block.
    ///
    /// Settings the method declares win; settings only the class declares
    /// are inherited. Parameters, URLs, the return type and the description
    /// always come from the method.
    #[must_use]
    pub fn merge(class: &DocBlock, method: &DocBlock) -> DocBlock {
        let mut tags = class.tags.clone();
        tags.extend(method.tags.clone());
        DocBlock {
            description: method.description.clone(),
            params: method.params.clone(),
            var: method.var.clone(),
            return_type: method.return_type.clone(),
            urls: method.urls.clone(),
            access: method.access.or(class.access),
            smart_auto_routing: method.smart_auto_routing.or(class.smart_auto_routing),
            status: method.status.or(class.status),
            headers: if method.headers.is_empty() {
                class.headers.clone()
            } else {
                method.headers.clone()
            },
            cache: method.cache.clone().or_else(|| class.cache.clone()),
            expires: method.expires.or(class.expires),
            throttle: method.throttle.or(class.throttle),
            formats: if method.formats.is_empty() {
                class.formats.clone()
            } else {
                method.formats.clone()
            },
            version: method.version.or(class.version),
            tags,
        }
    }

    /// Finds the `@param` line for `name`, falling back to position.
    #[must_use]
    pub fn param(&self, name: &str, index: usize) -> Option<&ParamDoc> {
        self.params
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
            .or_else(|| self.params.get(index).filter(|p| p.name.is_none()))
    }

    fn apply(&mut self, name: &str, value: &str) -> Result<(), DocError> {
        match name {
            "param" => {
                let param = parse_param_line(value)?;
                if param.name.is_none() {
                    return Err(DocError::new(format!("`@param {value}` has no `$name`")));
                }
                self.params.push(param);
            }
            "var" => self.var = Some(parse_param_line(value)?),
            "return" => {
                self.return_type = value.split_whitespace().next().map(ToString::to_string);
            }
            "url" => {
                let (verb, path) = value.split_once(char::is_whitespace).unwrap_or((value, ""));
                let method = HttpMethod::from_token(verb)
                    .ok_or_else(|| DocError::new(format!("`@url` has unknown verb `{verb}`")))?;
                self.urls.push(UrlDirective {
                    method,
                    path: path.trim().to_string(),
                });
            }
            "access" => {
                let level = AccessLevel::from_annotation(value).ok_or_else(|| {
                    DocError::new(format!("`@access {value}` is not public, hybrid or protected"))
                })?;
                self.access = Some(level);
            }
            "protected" => self.access = Some(AccessLevel::ProtectedByAnnotation),
            "smart-auto-routing" => {
                self.smart_auto_routing = Some(parse_bool(name, value)?);
            }
            "status" => self.status = Some(parse_number(name, value)?),
            "header" => {
                let (header, content) = value.split_once(':').ok_or_else(|| {
                    DocError::new(format!("`@header {value}` is not `Name: value`"))
                })?;
                self.headers
                    .push((header.trim().to_string(), content.trim().to_string()));
            }
            "cache" => self.cache = Some(value.to_string()),
            "expires" => self.expires = Some(parse_number(name, value)?),
            "throttle" => self.throttle = Some(parse_number(name, value)?),
            "format" => {
                self.formats = value
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
            "version" => self.version = Some(parse_number(name, value)?),
            _ => self
                .tags
                .entry(name.to_string())
                .or_default()
                .push(value.to_string()),
        }
        Ok(())
    }
}

fn strip_comment(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines().map(|line| {
        let mut line = line.trim();
        line = line.strip_prefix("/**").unwrap_or(line);
        line = line.strip_prefix("/*").unwrap_or(line);
        line = line.strip_suffix("*/").unwrap_or(line);
        line = line.trim_start();
        if !line.starts_with("*/") {
            line = line.strip_prefix('*').unwrap_or(line);
        }
        line.trim().to_string()
    })
}

fn parse_param_line(value: &str) -> Result<ParamDoc, DocError> {
    let (text, inline) = extract_inline(value)?;
    let mut tokens = text.split_whitespace().peekable();
    let mut doc = ParamDoc::default();

    if let Some(first) = tokens.peek() {
        if !first.starts_with('$') {
            doc.type_name = Some((*first).to_string());
            tokens.next();
        }
    }
    if let Some(name) = tokens.peek().and_then(|t| t.strip_prefix('$')) {
        doc.name = Some(name.to_string());
        tokens.next();
    }
    doc.description = tokens.collect::<Vec<_>>().join(" ");
    doc.inline = parse_inline(inline)?;
    Ok(doc)
}

/// Splits `{@name value}` tags out of `text`, returning the remaining text.
///
/// Braces nest, so patterns such as `{@pattern /^\d{3}$/}` survive.
fn extract_inline(text: &str) -> Result<(String, Vec<(String, String)>), DocError> {
    let mut remaining = String::with_capacity(text.len());
    let mut tags = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("{@") {
        remaining.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        let mut depth = 1usize;
        let mut end = None;
        for (i, ch) in body.char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = end.ok_or_else(|| DocError::new(format!("unterminated `{{@` in `{text}`")))?;
        let tag = &body[..end];
        let (name, value) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));
        tags.push((name.to_string(), value.trim().to_string()));
        rest = &body[end + 1..];
    }
    remaining.push_str(rest);
    Ok((remaining.trim().to_string(), tags))
}

fn parse_inline(tags: Vec<(String, String)>) -> Result<InlineTags, DocError> {
    let mut inline = InlineTags::default();
    for (name, value) in tags {
        match name.as_str() {
            "from" => {
                inline.from = Some(ParamSource::from_annotation(&value).ok_or_else(|| {
                    DocError::new(format!("`{{@from {value}}}` is not a parameter source"))
                })?);
            }
            "min" => inline.min = Some(parse_number(&name, &value)?),
            "max" => inline.max = Some(parse_number(&name, &value)?),
            "choice" => {
                inline.choice = Some(
                    value
                        .split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect(),
                );
            }
            "pattern" => {
                let pattern = value
                    .strip_prefix('/')
                    .and_then(|p| p.rfind('/').map(|end| &p[..end]))
                    .unwrap_or(&value);
                inline.pattern = Some(pattern.to_string());
            }
            "fix" => inline.fix = Some(parse_flag(&name, &value)?),
            "type" => inline.format = Some(value.to_ascii_lowercase()),
            "label" => inline.label = Some(value),
            "validate" => inline.validate = Some(parse_flag(&name, &value)?),
            "required" => inline.required = Some(parse_flag(&name, &value)?),
            "message" => inline.message = Some(value),
            _ => {
                inline.other.insert(name, value);
            }
        }
    }
    Ok(inline)
}

fn parse_number<T: std::str::FromStr>(tag: &str, value: &str) -> Result<T, DocError> {
    value
        .trim()
        .parse()
        .map_err(|_| DocError::new(format!("`@{tag}` expects a number, got `{value}`")))
}

fn parse_bool(tag: &str, value: &str) -> Result<bool, DocError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(DocError::new(format!(
            "`@{tag}` expects true or false, got `{value}`"
        ))),
    }
}

/// Like [`parse_bool`], but an empty value means `true`.
fn parse_flag(tag: &str, value: &str) -> Result<bool, DocError> {
    if value.trim().is_empty() {
        Ok(true)
    } else {
        parse_bool(tag, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHOR_GET: &str = r"
        /**
         * Fetch one author.
         *
         * Returns the full record.
         *
         * @param int $id author id {@from path} {@min 1}
         * @param string $fields which fields
         *        to return {@choice name,email}
         * @access hybrid
         * @expires 60
         * @header X-Api: authors
         * @expose
         */
    ";

    #[test]
    fn test_parse_full_block() {
        let doc = DocBlock::parse(AUTHOR_GET).unwrap();
        assert_eq!(doc.description, "Fetch one author.\n\nReturns the full record.");
        assert_eq!(doc.params.len(), 2);

        let id = &doc.params[0];
        assert_eq!(id.type_name.as_deref(), Some("int"));
        assert_eq!(id.name.as_deref(), Some("id"));
        assert_eq!(id.description, "author id");
        assert_eq!(id.inline.from, Some(ParamSource::Path));
        assert_eq!(id.inline.min, Some(1.0));

        let fields = &doc.params[1];
        assert_eq!(fields.description, "which fields to return");
        assert_eq!(
            fields.inline.choice,
            Some(vec!["name".to_string(), "email".to_string()])
        );

        assert_eq!(doc.access, Some(AccessLevel::Hybrid));
        assert_eq!(doc.expires, Some(60));
        assert_eq!(doc.headers, vec![("X-Api".to_string(), "authors".to_string())]);
        assert_eq!(doc.tags.get("expose"), Some(&vec![String::new()]));
    }

    #[test]
    fn test_url_directives() {
        let doc = DocBlock::parse("@url GET /{id}/books\n@url post files/*").unwrap();
        assert_eq!(
            doc.urls,
            vec![
                UrlDirective {
                    method: HttpMethod::Get,
                    path: "/{id}/books".to_string()
                },
                UrlDirective {
                    method: HttpMethod::Post,
                    path: "files/*".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_nested_braces_in_pattern() {
        let doc = DocBlock::parse(r"@param string $zip {@pattern /^\d{5}$/} {@fix}").unwrap();
        let zip = &doc.params[0].inline;
        assert_eq!(zip.pattern.as_deref(), Some(r"^\d{5}$"));
        assert_eq!(zip.fix, Some(true));
    }

    #[test]
    fn test_param_lookup_by_name_then_position() {
        let doc = DocBlock::parse("@param int $b\n@param string $a").unwrap();
        assert_eq!(doc.param("a", 0).and_then(|p| p.type_name.as_deref()), Some("string"));
        assert!(doc.param("c", 0).is_none());
    }

    #[test]
    fn test_malformed_blocks() {
        assert!(DocBlock::parse("@param int $id {@min 1").is_err());
        assert!(DocBlock::parse("@param int").is_err());
        assert!(DocBlock::parse("@url FETCH /x").is_err());
        assert!(DocBlock::parse("@access private").is_err());
        assert!(DocBlock::parse("@status created").is_err());
        assert!(DocBlock::parse("@header broken").is_err());
        assert!(DocBlock::parse("@param int $id {@from cookie}").is_err());
        assert!(DocBlock::parse("@smart-auto-routing maybe").is_err());
    }

    #[test]
    fn test_merge_method_overrides_class() {
        let class = DocBlock::parse("@access protected\n@cache private\n@expires 10\n@tag a").unwrap();
        let method = DocBlock::parse("Method.\n@access public\n@tag b").unwrap();
        let merged = DocBlock::merge(&class, &method);
        assert_eq!(merged.access, Some(AccessLevel::Public));
        assert_eq!(merged.cache.as_deref(), Some("private"));
        assert_eq!(merged.expires, Some(10));
        assert_eq!(merged.description, "Method.");
        assert_eq!(merged.tags.get("tag"), Some(&vec!["b".to_string()]));
    }

    #[test]
    fn test_protected_tag() {
        let doc = DocBlock::parse("@protected").unwrap();
        assert_eq!(doc.access, Some(AccessLevel::ProtectedByAnnotation));
    }

    #[test]
    fn test_var_line() {
        let doc = DocBlock::parse("@var string {@type email} {@label E-mail}").unwrap();
        let var = doc.var.unwrap();
        assert_eq!(var.type_name.as_deref(), Some("string"));
        assert!(var.name.is_none());
        assert_eq!(var.inline.format.as_deref(), Some("email"));
        assert_eq!(var.inline.label.as_deref(), Some("E-mail"));
    }
}
