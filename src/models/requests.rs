//! Request descriptors for the CMS API
//!
//! Describes an outgoing logical request: method, URL, params, body and
//! headers. Caching decisions are made from this description alone.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::{normalize_url, request_cache_key};

// == Method ==
/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// True for methods whose body is part of the request identity.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Api Request ==
/// A logical request against the API.
///
/// `url` is a path relative to the fetcher's base URL and may carry a query
/// string. `params` is a JSON object of query parameters (or `Null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ApiRequest {
    // == Constructors ==
    /// Creates a request with no params, body or headers.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Value::Null,
            body: None,
            headers: BTreeMap::new(),
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a POST request with a JSON body.
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, url).with_body(body)
    }

    // == Builders ==
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    // == Identity ==
    /// Normalized path without the query string; used for strategy lookup.
    pub fn path(&self) -> String {
        normalize_url(&self.url).0
    }

    /// Deterministic identity of this request.
    ///
    /// Serves both as the cache key and as the in-flight signature.
    /// Headers are not part of it.
    pub fn signature(&self) -> String {
        request_cache_key(self.method, &self.url, &self.params, self.body.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_strips_query() {
        let request = ApiRequest::get("/api/posts?page=2");
        assert_eq!(request.path(), "/api/posts");
        assert_eq!(ApiRequest::get("api//posts/").path(), "/api/posts");
    }

    #[test]
    fn test_signature_ignores_headers() {
        let plain = ApiRequest::get("/api/posts").with_params(json!({"page": 1}));
        let with_header = plain.clone().with_header("Accept", "application/json");
        assert_eq!(plain.signature(), with_header.signature());
    }

    #[test]
    fn test_signature_includes_body_for_mutations() {
        let a = ApiRequest::post("/api/comments", json!({"text": "a"}));
        let b = ApiRequest::post("/api/comments", json!({"text": "b"}));
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert!(Method::Delete.is_mutating());
        assert!(!Method::Get.is_mutating());
    }
}
