//! Cache key generation.
//!
//! Keys are `api:<METHOD>:<path>[?<sorted query>]:<canonical params>` with
//! `:<canonical body>` appended for mutating methods. Canonical JSON sorts
//! object keys at every depth, so logically equal requests share a key no
//! matter how their params were built.

use serde_json::Value;
use url::{form_urlencoded, Url};

use crate::models::Method;

/// Prefix of every request-derived key.
pub const API_KEY_PREFIX: &str = "api:";

// == Canonical JSON ==
/// Serializes `value` with object keys sorted at every depth.
///
/// Does not rely on `serde_json::Map` ordering, which changes to insertion
/// order if any crate in the build enables `preserve_order`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, inner)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(inner, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// == URL Normalization ==
/// Base used to parse relative request URLs.
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Request URL split into the parts that make up a key.
struct ParsedUrl {
    /// Scheme, host and port of an absolute URL
    origin: Option<String>,
    path: String,
    query: Option<String>,
}

fn parse_url(url: &str) -> ParsedUrl {
    let (parsed, origin) = match Url::parse(url) {
        Ok(absolute) if absolute.has_host() => {
            let origin = absolute.origin().ascii_serialization();
            (Some(absolute), Some(origin))
        }
        _ => {
            let relative = Url::parse(RELATIVE_BASE)
                .and_then(|base| base.join(url.trim_start_matches('/')))
                .ok();
            (relative, None)
        }
    };

    let Some(parsed) = parsed else {
        return ParsedUrl {
            origin,
            path: format!("/{}", url.trim_start_matches('/')),
            query: None,
        };
    };

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    ParsedUrl {
        origin,
        path: format!("/{}", segments.join("/")),
        query: parsed.query().and_then(canonical_query),
    }
}

/// Decodes the query pairs, sorts them and re-encodes them, so `a+b` and
/// `a%20b` produce the same string.
fn canonical_query(query: &str) -> Option<String> {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    if pairs.is_empty() {
        return None;
    }
    pairs.sort();
    Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish(),
    )
}

/// Normalizes a request URL into `(path, sorted query)`.
///
/// Collapses repeated slashes, drops a trailing slash (except for `/`),
/// drops any fragment and sorts query pairs. For absolute URLs only the
/// path is returned; the origin is kept in the cache key by
/// [`request_cache_key`].
pub fn normalize_url(url: &str) -> (String, Option<String>) {
    let parsed = parse_url(url);
    (parsed.path, parsed.query)
}

// == Key Builders ==
/// Builds the cache key of a request.
pub fn request_cache_key(method: Method, url: &str, params: &Value, body: Option<&Value>) -> String {
    let ParsedUrl {
        origin,
        path,
        query,
    } = parse_url(url);
    let mut key = format!(
        "{API_KEY_PREFIX}{}:{}{path}",
        method.as_str(),
        origin.unwrap_or_default()
    );
    if let Some(query) = query {
        key.push('?');
        key.push_str(&query);
    }

    key.push(':');
    match params {
        Value::Null => key.push_str("{}"),
        other => key.push_str(&canonical_json(other)),
    }

    if method.is_mutating() {
        if let Some(body) = body {
            key.push(':');
            key.push_str(&canonical_json(body));
        }
    }
    key
}

/// Cache key of a GET request to `path` with `params`.
pub fn generate_api_cache_key(path: &str, params: &Value) -> String {
    request_cache_key(Method::Get, path, params, None)
}
