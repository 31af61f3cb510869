//! Collaborator service error types

use perch_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("service reported an error: {0}")]
    ApiError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<ServiceError> for CloudError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => CloudError::NotFound(what),
            ServiceError::InvalidConfig(msg) => CloudError::InvalidConfig(msg),
            other => CloudError::Api(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
