//! Redfish client errors

use thiserror::Error;

/// Errors that can occur when talking to a Redfish service
#[derive(Debug, Error)]
pub enum RedfishError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Redfish service answered with a non-success status
    #[error("Redfish API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A resource the boot flow depends on does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}
