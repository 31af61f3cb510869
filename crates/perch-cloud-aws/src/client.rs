//! Region-scoped CloudFormation and EC2 client

use crate::error::{AwsError, is_missing_stack};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_cloudformation as cfn;
use aws_sdk_ec2 as ec2;
use chrono::{DateTime, Utc};
use perch_cloud::params::ParameterValue;
use perch_cloud::{
    Instance, InstanceState, Parameter, RegionClient, RegionClientFactory, Result,
    ScopedCredentials, StackDescription, StackEvent, StackRequest, StackStatus, Tag,
};
use std::collections::BTreeMap;

/// Transport retries per AWS call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Shared SDK configuration for one region and one set of scoped credentials
pub fn sdk_config(credentials: &ScopedCredentials, region: &str, max_attempts: u32) -> SdkConfig {
    let static_credentials = Credentials::from_keys(
        credentials.access_key_id.clone(),
        credentials.secret_access_key.clone(),
        Some(credentials.session_token.clone()),
    );

    SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .credentials_provider(SharedCredentialsProvider::new(static_credentials))
        .retry_config(RetryConfig::standard().with_max_attempts(max_attempts.max(1)))
        .build()
}

/// Builds [`AwsRegionClient`]s
#[derive(Debug, Clone)]
pub struct AwsClientFactory {
    max_attempts: u32,
}

impl AwsClientFactory {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl Default for AwsClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RegionClientFactory for AwsClientFactory {
    fn client(
        &self,
        credentials: &ScopedCredentials,
        region: &str,
    ) -> Result<Box<dyn RegionClient>> {
        let config = sdk_config(credentials, region, self.max_attempts);
        Ok(Box::new(AwsRegionClient {
            region: region.to_string(),
            cfn: cfn::Client::new(&config),
            ec2: ec2::Client::new(&config),
        }))
    }
}

pub struct AwsRegionClient {
    region: String,
    cfn: cfn::Client,
    ec2: ec2::Client,
}

#[async_trait]
impl RegionClient for AwsRegionClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn find_tagged_instances(&self, key: &str, value: &str) -> Result<Vec<Instance>> {
        let filter = ec2::types::Filter::builder()
            .name(format!("tag:{}", key))
            .values(value)
            .build();

        let mut instances = Vec::new();
        let mut paginator = self
            .ec2
            .describe_instances()
            .filters(filter)
            .into_paginator()
            .send();

        while let Some(page) = paginator
            .try_next()
            .await
            .map_err(|e| AwsError::api("DescribeInstances", e))?
        {
            for reservation in page.reservations() {
                instances.extend(reservation.instances().iter().map(convert_instance));
            }
        }

        tracing::debug!(
            "{} instances tagged {}={} in {}",
            instances.len(),
            key,
            value,
            self.region
        );
        Ok(instances)
    }

    async fn describe_stacks(&self, name: &str) -> Result<Vec<StackDescription>> {
        match self.cfn.describe_stacks().stack_name(name).send().await {
            Ok(response) => Ok(response.stacks().iter().map(convert_stack).collect()),
            Err(err) if is_missing_stack(&err) => {
                tracing::debug!("Stack {} does not exist in {}", name, self.region);
                Ok(Vec::new())
            }
            Err(err) => Err(AwsError::api("DescribeStacks", err).into()),
        }
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String> {
        let response = self
            .cfn
            .create_stack()
            .stack_name(&request.name)
            .template_body(&request.template_body)
            .set_parameters(Some(stack_parameters(request)))
            .set_capabilities(Some(capabilities(request)))
            .set_tags(Some(stack_tags(&request.tags)))
            .send()
            .await
            .map_err(|e| AwsError::api("CreateStack", e))?;

        stack_id("CreateStack", response.stack_id())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<String> {
        let mut builder = self
            .cfn
            .update_stack()
            .stack_name(&request.name)
            .template_body(&request.template_body)
            .set_parameters(Some(stack_parameters(request)))
            .set_capabilities(Some(capabilities(request)));
        if !request.tags.is_empty() {
            builder = builder.set_tags(Some(stack_tags(&request.tags)));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AwsError::api("UpdateStack", e))?;

        stack_id("UpdateStack", response.stack_id())
    }

    async fn describe_stack_events(&self, name: &str) -> Result<Vec<StackEvent>> {
        let mut events = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .cfn
                .describe_stack_events()
                .stack_name(name)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| AwsError::api("DescribeStackEvents", e))?;

            events.extend(response.stack_events().iter().map(convert_event));

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(events)
    }

    async fn reboot_instance(&self, instance_id: &str) -> Result<()> {
        self.ec2
            .reboot_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| AwsError::api("RebootInstances", e))?;
        tracing::info!("Requested reboot of {} in {}", instance_id, self.region);
        Ok(())
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        self.ec2
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| AwsError::api("TerminateInstances", e))?;
        tracing::info!("Requested termination of {} in {}", instance_id, self.region);
        Ok(())
    }
}

fn stack_id(operation: &'static str, id: Option<&str>) -> Result<String> {
    id.map(str::to_string).ok_or_else(|| {
        AwsError::InvalidResponse {
            operation,
            message: "missing stack id".to_string(),
        }
        .into()
    })
}

fn stack_parameters(request: &StackRequest) -> Vec<cfn::types::Parameter> {
    request
        .parameters
        .iter()
        .map(|(key, value)| {
            let builder = cfn::types::Parameter::builder().parameter_key(key);
            match value {
                ParameterValue::Value(v) => builder.parameter_value(v),
                ParameterValue::UsePrevious => builder.use_previous_value(true),
            }
            .build()
        })
        .collect()
}

fn capabilities(request: &StackRequest) -> Vec<cfn::types::Capability> {
    request
        .capabilities
        .iter()
        .map(|c| cfn::types::Capability::from(c.as_str()))
        .collect()
}

fn stack_tags(tags: &[Tag]) -> Vec<cfn::types::Tag> {
    tags.iter()
        .map(|t| cfn::types::Tag::builder().key(&t.key).value(&t.value).build())
        .collect()
}

pub(crate) fn to_chrono(dt: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn convert_stack(stack: &cfn::types::Stack) -> StackDescription {
    StackDescription {
        stack_id: stack.stack_id().unwrap_or_default().to_string(),
        name: stack.stack_name().unwrap_or_default().to_string(),
        status: StackStatus::new(
            stack
                .stack_status()
                .map(|s| s.as_str())
                .unwrap_or("UNKNOWN"),
        ),
        status_reason: stack.stack_status_reason().map(str::to_string),
        parameters: stack
            .parameters()
            .iter()
            .filter_map(|p| {
                Some(Parameter::new(
                    p.parameter_key()?,
                    p.parameter_value().unwrap_or_default(),
                ))
            })
            .collect(),
        tags: stack
            .tags()
            .iter()
            .filter_map(|t| Some(Tag::new(t.key()?, t.value().unwrap_or_default())))
            .collect(),
    }
}

fn convert_event(event: &cfn::types::StackEvent) -> StackEvent {
    StackEvent {
        timestamp: event.timestamp().and_then(to_chrono).unwrap_or_default(),
        resource_status: event
            .resource_status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        logical_resource_id: event.logical_resource_id().unwrap_or_default().to_string(),
        reason: event.resource_status_reason().map(str::to_string),
        physical_resource_id: event.physical_resource_id().map(str::to_string),
    }
}

fn convert_instance(instance: &ec2::types::Instance) -> Instance {
    let tags: BTreeMap<String, String> = instance
        .tags()
        .iter()
        .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
        .collect();

    Instance {
        instance_id: instance.instance_id().unwrap_or_default().to_string(),
        state: instance
            .state()
            .and_then(|s| s.name())
            .map(|n| InstanceState::parse(n.as_str()))
            .unwrap_or_else(|| InstanceState::Other("unknown".to_string())),
        instance_type: instance.instance_type().map(|t| t.as_str().to_string()),
        launch_time: instance.launch_time().and_then(to_chrono),
        private_ip: instance.private_ip_address().map(str::to_string),
        public_ip: instance.public_ip_address().map(str::to_string),
        tags,
    }
}
