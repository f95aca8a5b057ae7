//! Outbound fetch capability.
//!
//! The cache layer only needs `execute(request) -> response`. Any status is
//! returned as `Ok`; the caller decides what is cacheable. `Err` means the
//! request did not produce a response at all.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{CacheError, Result};
use crate::models::{ApiRequest, ApiResponse, Method};

// == Fetcher Trait ==
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

// == Http Fetcher ==
/// [`Fetcher`] backed by a `reqwest` client against one base URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFetcher {
    /// Creates a fetcher for `base_url` with a 30 second request timeout.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Self::with_client(client, base_url)
    }

    /// Creates a fetcher around an existing client.
    ///
    /// Any path on `base_url` is kept as a prefix of every request path.
    pub fn with_client(client: reqwest::Client, base_url: impl AsRef<str>) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Resolves the request URL; absolute URLs are used as-is.
    fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        Ok(self.base_url.join(request.url.trim_start_matches('/'))?)
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Flattens a JSON params object into query pairs. Strings are used as-is,
/// other values in their JSON form.
fn query_pairs(params: &Value) -> Result<Vec<(String, String)>> {
    match params {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()),
        other => Err(CacheError::InvalidConfig(format!(
            "request params must be an object, got {}",
            other
        ))),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(request)?;
        debug!(method = %request.method, url = %url, "sending request");

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), url.clone())
            .query(&query_pairs(&request.params)?);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!(status, url = %url, "received response");
        Ok(ApiResponse {
            status,
            body,
            headers,
        })
    }
}
