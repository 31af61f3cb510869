//! Region-scoped backend seams
//!
//! The scanner and orchestrator only ever talk to these traits. The AWS
//! implementation lives in `perch-cloud-aws`; tests substitute a recording fake.

use crate::credentials::ScopedCredentials;
use crate::error::Result;
use crate::model::{Instance, StackDescription, StackEvent, Tag};
use crate::params::ParameterSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything needed to submit a create or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRequest {
    pub name: String,
    pub template_body: String,
    pub parameters: ParameterSet,
    pub capabilities: Vec<String>,
    pub tags: Vec<Tag>,
}

/// Client bound to one region and one set of credentials
#[async_trait]
pub trait RegionClient: Send + Sync {
    fn region(&self) -> &str;

    /// Instances carrying the tag `key=value`
    async fn find_tagged_instances(&self, key: &str, value: &str) -> Result<Vec<Instance>>;

    /// Stacks with the given name. A stack that does not exist yields an empty list.
    async fn describe_stacks(&self, name: &str) -> Result<Vec<StackDescription>>;

    /// Returns the new stack id
    async fn create_stack(&self, request: &StackRequest) -> Result<String>;

    /// Returns the stack id
    async fn update_stack(&self, request: &StackRequest) -> Result<String>;

    /// Full event history in whatever order the backend reports it
    async fn describe_stack_events(&self, name: &str) -> Result<Vec<StackEvent>>;

    async fn reboot_instance(&self, instance_id: &str) -> Result<()>;

    async fn terminate_instance(&self, instance_id: &str) -> Result<()>;
}

/// Builds region-scoped clients
pub trait RegionClientFactory: Send + Sync {
    fn client(
        &self,
        credentials: &ScopedCredentials,
        region: &str,
    ) -> Result<Box<dyn RegionClient>>;
}

/// Fetches a stack template body for a region
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch_template(&self, region: &str, name: &str) -> Result<Vec<u8>>;
}
