//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.
//!
//! Only network-level failures and the cache-only miss reach callers.
//! Storage quota and corrupt-entry failures are recovered inside the
//! storage layer and never surface here as errors.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
///
/// The enum is `Clone` so that one settled in-flight request can hand the
/// same error to every deduplicated caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// The outbound fetch failed, or returned a non-2xx status
    #[error("Network error{}: {message}", status_suffix(.status))]
    Network {
        /// HTTP status, when the server answered at all
        status: Option<u16>,
        /// Transport error or response body
        message: String,
    },

    /// Cache-only lookup found nothing
    #[error("No cached data for key: {0}")]
    NoCachedData(String),

    /// Retry budget exhausted; wraps the last underlying failure
    #[error("Max retries exceeded after {attempts} attempts: {source}")]
    MaxRetriesExceeded {
        /// Total number of attempts made (initial + retries)
        attempts: u32,
        /// Last failure observed
        source: Box<CacheError>,
    },

    /// Stored payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Underlying raw store failed (I/O, not quota)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration value could not be used
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    // == Constructors ==
    /// Network failure without an HTTP status (connection refused, timeout, ...).
    pub fn network(message: impl Into<String>) -> Self {
        CacheError::Network {
            status: None,
            message: message.into(),
        }
    }

    /// Network failure carrying the status of a non-2xx response.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        CacheError::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Returns true for errors that came from the network leg.
    pub fn is_network(&self) -> bool {
        match self {
            CacheError::Network { .. } => true,
            CacheError::MaxRetriesExceeded { source, .. } => source.is_network(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Network {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for CacheError {
    fn from(err: url::ParseError) -> Self {
        CacheError::InvalidConfig(format!("invalid url: {err}"))
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
