//! Customer role inline policy maintenance

use crate::client::sdk_config;
use crate::error::{AwsError, Result};
use aws_sdk_iam as iam;
use perch_cloud::ScopedCredentials;
use std::path::Path;

/// IAM is global; any region reaches it
const IAM_REGION: &str = "us-east-1";

const BUNDLED_POLICY: &str = include_str!("../assets/bastion-policy.json");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSettings {
    pub role_prefix: String,
    pub policy_prefix: String,
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self {
            role_prefix: "bastion-role".to_string(),
            policy_prefix: "bastion-policy".to_string(),
        }
    }
}

impl RoleSettings {
    pub fn role_name(&self, customer_id: &str) -> String {
        format!("{}-{}", self.role_prefix, customer_id)
    }

    pub fn policy_name(&self, customer_id: &str) -> String {
        format!("{}-{}", self.policy_prefix, customer_id)
    }
}

/// A validated IAM policy document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument(String);

impl PolicyDocument {
    /// The policy shipped with this release
    pub fn bundled() -> Result<Self> {
        Self::parse(BUNDLED_POLICY)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(perch_cloud::CloudError::from)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(perch_cloud::CloudError::from)?;
        if value.get("Statement").and_then(|s| s.as_array()).is_none() {
            return Err(AwsError::InvalidResponse {
                operation: "PolicyDocument",
                message: "policy document has no Statement list".to_string(),
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn statement_count(&self) -> usize {
        serde_json::from_str::<serde_json::Value>(&self.0)
            .ok()
            .and_then(|v| v.get("Statement").and_then(|s| s.as_array()).map(Vec::len))
            .unwrap_or(0)
    }
}

/// An inline policy attached to a customer role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    pub role_name: String,
    pub policy_name: String,
}

pub struct RolePolicyManager {
    client: iam::Client,
    settings: RoleSettings,
}

impl RolePolicyManager {
    pub fn new(credentials: &ScopedCredentials, settings: RoleSettings, max_attempts: u32) -> Self {
        let config = sdk_config(credentials, IAM_REGION, max_attempts);
        Self {
            client: iam::Client::new(&config),
            settings,
        }
    }

    /// Look up the customer's inline role policy
    pub async fn find(&self, customer_id: &str) -> Result<RolePolicy> {
        let role_name = self.settings.role_name(customer_id);
        let policy_name = self.settings.policy_name(customer_id);

        let response = self
            .client
            .get_role_policy()
            .role_name(&role_name)
            .policy_name(&policy_name)
            .send()
            .await;

        match response {
            Ok(found) => Ok(RolePolicy {
                role_name: found.role_name,
                policy_name: found.policy_name,
            }),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                Err(AwsError::PolicyNotFound(format!(
                    "{} on role {}",
                    policy_name, role_name
                )))
            }
            Err(err) => Err(AwsError::api("GetRolePolicy", err)),
        }
    }

    /// Overwrite the inline policy with `document`
    pub async fn replace(&self, policy: &RolePolicy, document: &PolicyDocument) -> Result<()> {
        self.client
            .put_role_policy()
            .role_name(&policy.role_name)
            .policy_name(&policy.policy_name)
            .policy_document(document.as_str())
            .send()
            .await
            .map_err(|e| AwsError::api("PutRolePolicy", e))?;

        tracing::info!(
            "Replaced policy {} on role {}",
            policy.policy_name,
            policy.role_name
        );
        Ok(())
    }
}
