//! Response descriptors returned by the outbound fetcher

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

// == Api Response ==
/// A response from the API, as cached and as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Decoded JSON body (plain text bodies become a JSON string)
    pub body: Value,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ApiResponse {
    /// Creates a response with no headers.
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            headers: BTreeMap::new(),
        }
    }

    /// A `200 OK` response.
    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    /// True for statuses in [200, 300); only these are cacheable.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}
