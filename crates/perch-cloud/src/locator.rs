//! Resolve a customer and find where their bastion lives
//!
//! There is no durable region index. Every lookup resolves the customer,
//! acquires fresh credentials, then scans the configured regions in order.

use crate::credentials::{CredentialBroker, ScopedCredentials};
use crate::error::{CloudError, Result};
use crate::identity::{CustomerIdentity, IdentityResolver, UserQuery, parse_bastion_id};
use crate::model::{DEFAULT_STACK_PREFIX, Instance, StackDescription, stack_name};
use crate::scanner::{
    NamedStackQuery, RegionScanner, ScanOutcome, ScanPolicy, TaggedInstanceQuery,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Scan policy used for stack lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackPolicy {
    /// Stop at the first region holding the stack. One query per region up to the hit.
    FirstMatch,
    /// Query every configured region so a stack duplicated across regions is
    /// reported as ambiguous. Costs one query per configured region even when
    /// the first region holds the stack; `first_match` is the faster choice.
    #[default]
    Unique,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorSettings {
    pub stack_prefix: String,
    pub stack_policy: StackPolicy,
    /// Tag carrying the customer id on bastion instances
    pub customer_tag: String,
    /// Tag carrying the bastion id on bastion instances
    pub bastion_tag: String,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            stack_prefix: DEFAULT_STACK_PREFIX.to_string(),
            stack_policy: StackPolicy::Unique,
            customer_tag: "CustomerId".to_string(),
            bastion_tag: "BastionId".to_string(),
        }
    }
}

/// A resource together with where it was found and how to reach it
#[derive(Debug, Clone)]
pub struct LocatedResource<T> {
    pub identity: CustomerIdentity,
    pub region: String,
    pub resource: T,
    pub credentials: ScopedCredentials,
}

/// A lookup that found nothing; still enough to create the resource
#[derive(Debug, Clone)]
pub struct Unlocated {
    pub identity: CustomerIdentity,
    pub credentials: ScopedCredentials,
    /// What was looked for, for error messages
    pub subject: String,
}

#[derive(Debug, Clone)]
pub enum Location<T> {
    Found(LocatedResource<T>),
    NotFound(Unlocated),
}

impl<T> Location<T> {
    pub fn identity(&self) -> &CustomerIdentity {
        match self {
            Location::Found(found) => &found.identity,
            Location::NotFound(missing) => &missing.identity,
        }
    }

    pub fn credentials(&self) -> &ScopedCredentials {
        match self {
            Location::Found(found) => &found.credentials,
            Location::NotFound(missing) => &missing.credentials,
        }
    }

    pub fn region(&self) -> Option<&str> {
        match self {
            Location::Found(found) => Some(&found.region),
            Location::NotFound(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Location::Found(_))
    }

    pub fn found(&self) -> Option<&LocatedResource<T>> {
        match self {
            Location::Found(found) => Some(found),
            Location::NotFound(_) => None,
        }
    }

    /// Treat absence as an error
    pub fn require(self) -> Result<LocatedResource<T>> {
        match self {
            Location::Found(found) => Ok(found),
            Location::NotFound(missing) => Err(CloudError::NotFound(format!(
                "{} for customer {}",
                missing.subject, missing.identity.customer_id
            ))),
        }
    }
}

/// Every bastion instance of a customer across all regions
#[derive(Debug, Clone)]
pub struct Inventory {
    pub identity: CustomerIdentity,
    pub instances: Vec<(String, Instance)>,
}

#[derive(Clone)]
pub struct ResourceLocator {
    resolver: Arc<dyn IdentityResolver>,
    broker: CredentialBroker,
    scanner: RegionScanner,
    settings: LocatorSettings,
}

impl ResourceLocator {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        broker: CredentialBroker,
        scanner: RegionScanner,
        settings: LocatorSettings,
    ) -> Self {
        Self {
            resolver,
            broker,
            scanner,
            settings,
        }
    }

    pub fn scanner(&self) -> &RegionScanner {
        &self.scanner
    }

    pub fn settings(&self) -> &LocatorSettings {
        &self.settings
    }

    /// Parse a customer argument and resolve it to a canonical identity
    pub async fn resolve(&self, customer: &str) -> Result<CustomerIdentity> {
        let query = UserQuery::parse(customer)?;
        let identity = self.resolver.resolve_user(&query).await?;
        tracing::info!(
            "Resolved {} to customer {} ({})",
            query,
            identity.customer_id,
            identity.email
        );
        Ok(identity)
    }

    pub async fn credentials_for(
        &self,
        customer: &str,
    ) -> Result<(CustomerIdentity, ScopedCredentials)> {
        let identity = self.resolve(customer).await?;
        let credentials = self.broker.acquire(&identity).await?;
        Ok((identity, credentials))
    }

    /// Find the customer's stack under its default name
    pub async fn locate_stack(&self, customer: &str) -> Result<Location<StackDescription>> {
        let (identity, credentials) = self.credentials_for(customer).await?;
        let name = stack_name(&self.settings.stack_prefix, &identity.customer_id);
        self.find_stack(identity, credentials, name).await
    }

    /// Find a stack by explicit name on behalf of a customer
    pub async fn locate_stack_named(
        &self,
        customer: &str,
        name: &str,
    ) -> Result<Location<StackDescription>> {
        let (identity, credentials) = self.credentials_for(customer).await?;
        self.find_stack(identity, credentials, name.to_string())
            .await
    }

    async fn find_stack(
        &self,
        identity: CustomerIdentity,
        credentials: ScopedCredentials,
        name: String,
    ) -> Result<Location<StackDescription>> {
        let query = NamedStackQuery::new(name);
        let policy = match self.settings.stack_policy {
            StackPolicy::FirstMatch => ScanPolicy::FirstMatch,
            StackPolicy::Unique => ScanPolicy::Unique,
        };

        let outcome = self.scanner.scan(&credentials, &query, &policy).await?;
        Ok(into_location(outcome, identity, credentials, format!("stack {}", query.name)))
    }

    /// Find a bastion instance, preferring a running one
    pub async fn locate_instance(
        &self,
        customer: &str,
        bastion_id: &str,
    ) -> Result<Location<Instance>> {
        let bastion_id = parse_bastion_id(bastion_id)?;
        let (identity, credentials) = self.credentials_for(customer).await?;

        let query = TaggedInstanceQuery::new(self.settings.bastion_tag.clone(), bastion_id.clone());
        let policy = ScanPolicy::refine(Instance::is_running);

        let outcome = self.scanner.scan(&credentials, &query, &policy).await?;
        Ok(into_location(outcome, identity, credentials, format!("bastion {}", bastion_id)))
    }

    pub async fn list_instances(&self, customer: &str) -> Result<Inventory> {
        let (identity, credentials) = self.credentials_for(customer).await?;
        let query = TaggedInstanceQuery::new(
            self.settings.customer_tag.clone(),
            identity.customer_id.clone(),
        );
        let instances = self.scanner.collect(&credentials, &query).await?;
        Ok(Inventory {
            identity,
            instances,
        })
    }
}

fn into_location<T>(
    outcome: ScanOutcome<T>,
    identity: CustomerIdentity,
    credentials: ScopedCredentials,
    subject: String,
) -> Location<T> {
    match outcome {
        ScanOutcome::Found { region, resource } => Location::Found(LocatedResource {
            identity,
            region,
            resource,
            credentials,
        }),
        ScanOutcome::NotFound => Location::NotFound(Unlocated {
            identity,
            credentials,
            subject,
        }),
    }
}
