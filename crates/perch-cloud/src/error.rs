//! Error types for bastion lookup and stack lifecycle operations

use thiserror::Error;

/// Errors surfaced by the locator, scanner, merger and orchestrator
#[derive(Error, Debug)]
pub enum CloudError {
    /// Malformed identifier or missing argument. The CLI prints usage for these.
    #[error("{0}")]
    UserInput(String),

    #[error("cannot obtain AWS credentials for customer {customer_id}: {reason}")]
    CredentialUnavailable { customer_id: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("multiple {what} found in {}", regions.join(", "))]
    AmbiguousResource { what: String, regions: Vec<String> },

    #[error("stack {name} already exists in {region}")]
    AlreadyExists { name: String, region: String },

    #[error("timeout: {0}")]
    Timeout(String),

    /// Transport or service error from a backend call, passed through verbatim
    #[error("API error: {0}")]
    Api(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn user_input(message: impl Into<String>) -> Self {
        CloudError::UserInput(message.into())
    }

    pub fn ambiguous(what: impl Into<String>, regions: Vec<String>) -> Self {
        CloudError::AmbiguousResource {
            what: what.into(),
            regions,
        }
    }

    /// Whether the operator should be shown usage help for this error
    pub fn is_user_error(&self) -> bool {
        matches!(self, CloudError::UserInput(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_classification() {
        assert!(CloudError::user_input("missing argument").is_user_error());
        assert!(!CloudError::NotFound("stack".into()).is_user_error());
        assert!(!CloudError::Timeout("stack".into()).is_user_error());
    }

    #[test]
    fn test_ambiguous_message_lists_regions() {
        let err = CloudError::ambiguous(
            "stacks named bastion-stack-1",
            vec!["us-west-1".into(), "eu-west-1".into()],
        );
        assert_eq!(
            err.to_string(),
            "multiple stacks named bastion-stack-1 found in us-west-1, eu-west-1"
        );
    }
}
