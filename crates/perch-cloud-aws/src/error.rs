//! AWS backend error types

use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use perch_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected {operation} response: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },

    #[error("template download failed: {0}")]
    TemplateDownload(#[from] reqwest::Error),

    #[error("template not available at {url}: HTTP {status}")]
    TemplateStatus { url: String, status: u16 },

    #[error("no images found: {0}")]
    NoImages(String),

    #[error("role policy not found: {0}")]
    PolicyNotFound(String),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

impl AwsError {
    /// Capture an SDK error with its service error code and full context chain
    pub fn api<E>(operation: &'static str, err: E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
    {
        AwsError::Api {
            operation,
            code: err.code().map(str::to_string),
            message: DisplayErrorContext(&err).to_string(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// CloudFormation reports a missing stack as a validation error rather than an empty list
pub fn is_missing_stack<E: ProvideErrorMetadata>(err: &E) -> bool {
    err.code() == Some("ValidationError")
        && err
            .message()
            .is_some_and(|m| m.contains("does not exist"))
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::CloudError(inner) => inner,
            AwsError::TemplateDownload(_) | AwsError::TemplateStatus { .. } => {
                CloudError::Template(err.to_string())
            }
            AwsError::NoImages(what) => CloudError::NotFound(format!("images {}", what)),
            AwsError::PolicyNotFound(what) => CloudError::NotFound(format!("role policy {}", what)),
            other => CloudError::Api(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
