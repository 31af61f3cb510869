//! Customer identity parsing and resolution

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static UUID_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]{8}-[a-z0-9]{4}-[1-5][a-z0-9]{3}-[a-z0-9]{4}-[a-z0-9]{12}$")
        .expect("uuid pattern is valid")
});

static EMAIL_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$").expect("email pattern is valid")
});

/// How the operator referred to a customer on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserQuery {
    Email(String),
    CustomerId(String),
}

impl UserQuery {
    /// Parse a customer email or customer UUID
    pub fn parse(raw: &str) -> Result<Self> {
        let candidate = raw.trim().to_ascii_lowercase();

        if EMAIL_FORMAT.is_match(&candidate) {
            return Ok(UserQuery::Email(candidate));
        }
        if UUID_FORMAT.is_match(&candidate) {
            return Ok(UserQuery::CustomerId(candidate));
        }

        Err(CloudError::user_input(format!(
            "no email or customer UUID found in '{}'",
            raw
        )))
    }
}

impl std::fmt::Display for UserQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserQuery::Email(email) => write!(f, "email {}", email),
            UserQuery::CustomerId(id) => write!(f, "customer {}", id),
        }
    }
}

/// Validate a bastion identifier before it is used in any lookup
pub fn parse_bastion_id(raw: &str) -> Result<String> {
    let candidate = raw.trim().to_ascii_lowercase();
    if UUID_FORMAT.is_match(&candidate) {
        Ok(candidate)
    } else {
        Err(CloudError::user_input(format!("invalid bastion id: {}", raw)))
    }
}

/// Canonical customer record returned by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIdentity {
    pub customer_id: String,
    pub email: String,
    pub display_name: String,
}

/// Maps an email or customer id to a canonical customer record
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Fails with [`CloudError::NotFound`] when no such customer exists
    async fn resolve_user(&self, query: &UserQuery) -> Result<CustomerIdentity>;
}
