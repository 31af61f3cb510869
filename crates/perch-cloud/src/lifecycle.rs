//! Stack lifecycle orchestration
//!
//! Plans and submits stack creates and updates, waits for terminal statuses
//! and reads event history. Every mutation is planned first; in dry-run mode
//! the plan is returned without being submitted.

use crate::action::{ActionType, ApplyOutcome, StackPlan};
use crate::backend::{RegionClient, RegionClientFactory, StackRequest, TemplateSource};
use crate::credentials::ScopedCredentials;
use crate::error::{CloudError, Result};
use crate::locator::{LocatedResource, Location};
use crate::model::{
    Instance, PARAM_CUSTOMER_ID, StackDescription, StackEvent, StackOutcome, StackStatus, Tag,
};
use crate::params::{ParameterOverrides, ParameterValue, merge};
use crate::poll::{PollConfig, PollResult, poll_until};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Template file name fetched through the template source
    pub template_name: String,
    pub capabilities: Vec<String>,
    /// Tag key written on new stacks with the customer id
    pub customer_tag: String,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            template_name: "bastion-cf.template".to_string(),
            capabilities: vec!["CAPABILITY_IAM".to_string()],
            customer_tag: "CustomerId".to_string(),
        }
    }
}

/// A plan together with what happened to it
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub plan: StackPlan,
    pub outcome: ApplyOutcome,
}

/// Final status of a stack after waiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStatus {
    pub stack_name: String,
    pub status: StackStatus,
    pub reason: Option<String>,
}

impl TerminalStatus {
    pub fn outcome(&self) -> StackOutcome {
        self.status.outcome()
    }

    pub fn succeeded(&self) -> bool {
        self.outcome() == StackOutcome::Succeeded
    }
}

pub struct LifecycleOrchestrator {
    factory: Arc<dyn RegionClientFactory>,
    templates: Arc<dyn TemplateSource>,
    settings: LifecycleSettings,
    dry_run: bool,
}

impl LifecycleOrchestrator {
    pub fn new(
        factory: Arc<dyn RegionClientFactory>,
        templates: Arc<dyn TemplateSource>,
        settings: LifecycleSettings,
        dry_run: bool,
    ) -> Self {
        Self {
            factory,
            templates,
            settings,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn client(&self, credentials: &ScopedCredentials, region: &str) -> Result<Box<dyn RegionClient>> {
        self.factory.client(credentials, region)
    }

    async fn template_body(&self, region: &str) -> Result<String> {
        let bytes = self
            .templates
            .fetch_template(region, &self.settings.template_name)
            .await?;
        String::from_utf8(bytes).map_err(|e| {
            CloudError::Template(format!(
                "{} for {} is not valid UTF-8: {}",
                self.settings.template_name, region, e
            ))
        })
    }

    /// Plan a new stack in `region`; the lookup must have found nothing
    pub async fn plan_create(
        &self,
        location: &Location<StackDescription>,
        stack_name: &str,
        region: &str,
        overrides: &ParameterOverrides,
    ) -> Result<StackPlan> {
        if let Location::Found(found) = location {
            return Err(CloudError::AlreadyExists {
                name: found.resource.name.clone(),
                region: found.region.clone(),
            });
        }

        let parameters = merge(None, overrides)?;
        let retained = parameters.retained();
        if !retained.is_empty() {
            return Err(CloudError::user_input(format!(
                "a new stack cannot keep previous values for: {}",
                retained.join(", ")
            )));
        }

        let customer_id = &location.identity().customer_id;
        if let Some(ParameterValue::Value(given)) = parameters.get(PARAM_CUSTOMER_ID) {
            if given != customer_id {
                return Err(CloudError::user_input(format!(
                    "CustomerId parameter {} does not match customer {}",
                    given, customer_id
                )));
            }
        }

        let template_body = self.template_body(region).await?;
        Ok(StackPlan::new(
            ActionType::Create,
            region,
            StackRequest {
                name: stack_name.to_string(),
                template_body,
                parameters,
                capabilities: self.settings.capabilities.clone(),
                tags: vec![Tag::new(self.settings.customer_tag.clone(), customer_id.clone())],
            },
        ))
    }

    /// Plan an in-place update of the located stack
    pub async fn plan_update(
        &self,
        location: &Location<StackDescription>,
        overrides: &ParameterOverrides,
    ) -> Result<StackPlan> {
        let found = match location {
            Location::Found(found) => found,
            Location::NotFound(missing) => {
                return Err(CloudError::NotFound(format!(
                    "{} for customer {}",
                    missing.subject, missing.identity.customer_id
                )));
            }
        };

        let parameters = merge(Some(&found.resource.parameters), overrides)?;
        let template_body = self.template_body(&found.region).await?;

        Ok(StackPlan::new(
            ActionType::Update,
            found.region.clone(),
            StackRequest {
                name: found.resource.name.clone(),
                template_body,
                parameters,
                capabilities: self.settings.capabilities.clone(),
                tags: Vec::new(),
            },
        ))
    }

    /// Submit a plan, or skip it in dry-run mode
    pub async fn apply(
        &self,
        plan: &StackPlan,
        credentials: &ScopedCredentials,
    ) -> Result<ApplyOutcome> {
        if self.dry_run {
            tracing::info!(
                "Dry run: not submitting {} of {}",
                plan.action,
                plan.stack_name()
            );
            return Ok(ApplyOutcome::Skipped);
        }

        let client = self.client(credentials, &plan.region)?;
        let stack_id = match plan.action {
            ActionType::Create => client.create_stack(&plan.request).await?,
            ActionType::Update => client.update_stack(&plan.request).await?,
        };
        tracing::info!("Submitted {} of {} ({})", plan.action, plan.stack_name(), stack_id);

        Ok(ApplyOutcome::Submitted { stack_id })
    }

    pub async fn create(
        &self,
        location: &Location<StackDescription>,
        stack_name: &str,
        region: &str,
        overrides: &ParameterOverrides,
    ) -> Result<Applied> {
        let plan = self
            .plan_create(location, stack_name, region, overrides)
            .await?;
        let outcome = self.apply(&plan, location.credentials()).await?;
        Ok(Applied { plan, outcome })
    }

    pub async fn update(
        &self,
        location: &Location<StackDescription>,
        overrides: &ParameterOverrides,
    ) -> Result<Applied> {
        let plan = self.plan_update(location, overrides).await?;
        let outcome = self.apply(&plan, location.credentials()).await?;
        Ok(Applied { plan, outcome })
    }

    /// Wait until the stack reaches a terminal status or the deadline passes
    pub async fn await_terminal(
        &self,
        credentials: &ScopedCredentials,
        region: &str,
        stack_name: &str,
        config: &PollConfig,
    ) -> Result<TerminalStatus> {
        let client = self.client(credentials, region)?;
        let client: &dyn RegionClient = client.as_ref();

        let result = poll_until(config, move || async move {
            let stack = describe_one(client, stack_name).await?;
            tracing::info!("Stack {} is {}", stack_name, stack.status);
            if stack.status.is_terminal() {
                Ok(Some(TerminalStatus {
                    stack_name: stack.name,
                    status: stack.status,
                    reason: stack.status_reason,
                }))
            } else {
                Ok(None)
            }
        })
        .await?;

        match result {
            PollResult::Ready(status) => Ok(status),
            PollResult::TimedOut { attempts, elapsed } => Err(CloudError::Timeout(format!(
                "stack {} not terminal after {} checks over {}s",
                stack_name,
                attempts,
                elapsed.as_secs()
            ))),
        }
    }

    /// The `max_count` newest events, newest first
    pub async fn list_events(
        &self,
        credentials: &ScopedCredentials,
        region: &str,
        stack_name: &str,
        max_count: usize,
    ) -> Result<Vec<StackEvent>> {
        let client = self.client(credentials, region)?;
        let mut events = client.describe_stack_events(stack_name).await?;
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(max_count);
        Ok(events)
    }

    /// Returns false when skipped by dry-run
    pub async fn reboot_instance(&self, located: &LocatedResource<Instance>) -> Result<bool> {
        if self.dry_run {
            tracing::info!("Dry run: not rebooting {}", located.resource.instance_id);
            return Ok(false);
        }
        let client = self.client(&located.credentials, &located.region)?;
        client.reboot_instance(&located.resource.instance_id).await?;
        Ok(true)
    }

    /// Returns false when skipped by dry-run
    pub async fn terminate_instance(&self, located: &LocatedResource<Instance>) -> Result<bool> {
        if self.dry_run {
            tracing::info!("Dry run: not terminating {}", located.resource.instance_id);
            return Ok(false);
        }
        let client = self.client(&located.credentials, &located.region)?;
        client
            .terminate_instance(&located.resource.instance_id)
            .await?;
        Ok(true)
    }
}

async fn describe_one(client: &dyn RegionClient, stack_name: &str) -> Result<StackDescription> {
    let mut stacks = client.describe_stacks(stack_name).await?;
    match stacks.len() {
        0 => Err(CloudError::NotFound(format!(
            "stack {} in {}",
            stack_name,
            client.region()
        ))),
        1 => Ok(stacks.remove(0)),
        _ => Err(CloudError::ambiguous(
            format!("stacks named {}", stack_name),
            vec![client.region().to_string()],
        )),
    }
}
