//! Data model shared by the locator, merger and orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter keys a bastion stack understands
pub const PARAM_INSTANCE_TYPE: &str = "InstanceType";
pub const PARAM_VPC_ID: &str = "VpcId";
pub const PARAM_SUBNET_ID: &str = "SubnetId";
pub const PARAM_ASSOCIATE_PUBLIC_IP: &str = "AssociatePublicIpAddress";
pub const PARAM_CUSTOMER_ID: &str = "CustomerId";
pub const PARAM_BASTION_ID: &str = "BastionId";
pub const PARAM_IMAGE_ID: &str = "ImageId";
pub const PARAM_ALLOW_SSH: &str = "AllowSSH";
pub const PARAM_USER_DATA: &str = "UserData";

/// Every key a new stack must be given a value for
pub const REQUIRED_PARAMETERS: &[&str] = &[
    PARAM_INSTANCE_TYPE,
    PARAM_VPC_ID,
    PARAM_SUBNET_ID,
    PARAM_ASSOCIATE_PUBLIC_IP,
    PARAM_CUSTOMER_ID,
    PARAM_BASTION_ID,
    PARAM_IMAGE_ID,
    PARAM_ALLOW_SSH,
    PARAM_USER_DATA,
];

/// Default prefix of per-customer stack names
pub const DEFAULT_STACK_PREFIX: &str = "bastion-stack";

/// Deterministic stack name for a customer
pub fn stack_name(prefix: &str, customer_id: &str) -> String {
    format!("{}-{}", prefix, customer_id)
}

/// Key/value pair as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Lifecycle status string reported for a stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackStatus(String);

/// How a terminal status ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackOutcome {
    Succeeded,
    RolledBack,
    Failed,
}

impl StackStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Terminal statuses do not change without a new operation
    pub fn is_terminal(&self) -> bool {
        self.0.ends_with("_COMPLETE") || self.0.ends_with("_FAILED")
    }

    pub fn is_in_progress(&self) -> bool {
        self.0.ends_with("_IN_PROGRESS")
    }

    /// Only meaningful once the status is terminal
    pub fn outcome(&self) -> StackOutcome {
        if self.0.contains("ROLLBACK") {
            StackOutcome::RolledBack
        } else if self.0.ends_with("_FAILED") {
            StackOutcome::Failed
        } else {
            StackOutcome::Succeeded
        }
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A declarative stack as described by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    pub stack_id: String,
    pub name: String,
    pub status: StackStatus,
    pub status_reason: Option<String>,
    pub parameters: Vec<Parameter>,
    pub tags: Vec<Tag>,
}

impl StackDescription {
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

/// One entry of a stack's event history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    pub timestamp: DateTime<Utc>,
    pub resource_status: String,
    pub logical_resource_id: String,
    pub reason: Option<String>,
    pub physical_resource_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
    Other(String),
}

impl InstanceState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "shutting-down" => InstanceState::ShuttingDown,
            "terminated" => InstanceState::Terminated,
            "stopping" => InstanceState::Stopping,
            "stopped" => InstanceState::Stopped,
            other => InstanceState::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::Pending => write!(f, "pending"),
            InstanceState::Running => write!(f, "running"),
            InstanceState::ShuttingDown => write!(f, "shutting-down"),
            InstanceState::Terminated => write!(f, "terminated"),
            InstanceState::Stopping => write!(f, "stopping"),
            InstanceState::Stopped => write!(f, "stopped"),
            InstanceState::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A bastion compute instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub state: InstanceState,
    pub instance_type: Option<String>,
    pub launch_time: Option<DateTime<Utc>>,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl Instance {
    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_name() {
        assert_eq!(
            stack_name(DEFAULT_STACK_PREFIX, "cust-1"),
            "bastion-stack-cust-1"
        );
    }

    #[test]
    fn test_terminal_statuses() {
        for s in [
            "CREATE_COMPLETE",
            "UPDATE_COMPLETE",
            "ROLLBACK_COMPLETE",
            "UPDATE_ROLLBACK_COMPLETE",
            "CREATE_FAILED",
            "DELETE_FAILED",
        ] {
            assert!(StackStatus::new(s).is_terminal(), "{} should be terminal", s);
        }
        for s in [
            "CREATE_IN_PROGRESS",
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            "UPDATE_ROLLBACK_IN_PROGRESS",
        ] {
            assert!(!StackStatus::new(s).is_terminal(), "{} should not be terminal", s);
        }
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(
            StackStatus::new("UPDATE_COMPLETE").outcome(),
            StackOutcome::Succeeded
        );
        assert_eq!(
            StackStatus::new("ROLLBACK_COMPLETE").outcome(),
            StackOutcome::RolledBack
        );
        assert_eq!(
            StackStatus::new("UPDATE_ROLLBACK_FAILED").outcome(),
            StackOutcome::RolledBack
        );
        assert_eq!(StackStatus::new("CREATE_FAILED").outcome(), StackOutcome::Failed);
    }

    #[test]
    fn test_instance_state_round_trip_names() {
        assert_eq!(InstanceState::parse("running"), InstanceState::Running);
        assert_eq!(InstanceState::parse("shutting-down").to_string(), "shutting-down");
        assert_eq!(
            InstanceState::parse("rebooting"),
            InstanceState::Other("rebooting".to_string())
        );
    }
}
