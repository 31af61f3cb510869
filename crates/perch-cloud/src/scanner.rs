//! Sequential region scan
//!
//! Regions are visited strictly in list order, one client per region. The
//! scan policy decides when to stop and what counts as ambiguous.

use crate::backend::{RegionClient, RegionClientFactory};
use crate::credentials::ScopedCredentials;
use crate::error::{CloudError, Result};
use crate::model::{Instance, StackDescription};
use crate::region::RegionList;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A lookup that can be run against one region
#[async_trait]
pub trait RegionQuery: Send + Sync {
    type Item: Send;

    /// Human readable subject for log lines and ambiguity errors
    fn describe(&self) -> String;

    async fn query(&self, client: &dyn RegionClient) -> Result<Vec<Self::Item>>;
}

/// Instances tagged `tag_key=tag_value`
#[derive(Debug, Clone)]
pub struct TaggedInstanceQuery {
    pub tag_key: String,
    pub tag_value: String,
}

impl TaggedInstanceQuery {
    pub fn new(tag_key: impl Into<String>, tag_value: impl Into<String>) -> Self {
        Self {
            tag_key: tag_key.into(),
            tag_value: tag_value.into(),
        }
    }
}

#[async_trait]
impl RegionQuery for TaggedInstanceQuery {
    type Item = Instance;

    fn describe(&self) -> String {
        format!("instances tagged {}={}", self.tag_key, self.tag_value)
    }

    async fn query(&self, client: &dyn RegionClient) -> Result<Vec<Instance>> {
        client
            .find_tagged_instances(&self.tag_key, &self.tag_value)
            .await
    }
}

/// Stacks with an exact name
#[derive(Debug, Clone)]
pub struct NamedStackQuery {
    pub name: String,
}

impl NamedStackQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl RegionQuery for NamedStackQuery {
    type Item = StackDescription;

    fn describe(&self) -> String {
        format!("stacks named {}", self.name)
    }

    async fn query(&self, client: &dyn RegionClient) -> Result<Vec<StackDescription>> {
        client.describe_stacks(&self.name).await
    }
}

/// When a scan stops and what it does with matches in several regions
pub enum ScanPolicy<T> {
    /// Stop at the first region holding a match
    FirstMatch,
    /// Visit every region; matches in two regions are ambiguous
    Unique,
    /// Stop at the first match satisfying the predicate, else fall back to the last match seen
    Refine(Box<dyn Fn(&T) -> bool + Send + Sync>),
}

impl<T> ScanPolicy<T> {
    pub fn refine(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        ScanPolicy::Refine(Box::new(predicate))
    }
}

impl<T> fmt::Debug for ScanPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPolicy::FirstMatch => write!(f, "FirstMatch"),
            ScanPolicy::Unique => write!(f, "Unique"),
            ScanPolicy::Refine(_) => write!(f, "Refine(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome<T> {
    Found { region: String, resource: T },
    NotFound,
}

/// Walks the configured regions with one set of credentials
#[derive(Clone)]
pub struct RegionScanner {
    regions: RegionList,
    factory: Arc<dyn RegionClientFactory>,
}

impl RegionScanner {
    pub fn new(regions: RegionList, factory: Arc<dyn RegionClientFactory>) -> Self {
        Self { regions, factory }
    }

    pub fn regions(&self) -> &RegionList {
        &self.regions
    }

    pub fn factory(&self) -> &Arc<dyn RegionClientFactory> {
        &self.factory
    }

    pub async fn scan<Q>(
        &self,
        credentials: &ScopedCredentials,
        query: &Q,
        policy: &ScanPolicy<Q::Item>,
    ) -> Result<ScanOutcome<Q::Item>>
    where
        Q: RegionQuery + ?Sized,
    {
        let subject = query.describe();
        let mut held: Option<(String, Q::Item)> = None;

        for region in self.regions.iter() {
            tracing::info!("Checking region {} for {}", region, subject);

            let client = self.factory.client(credentials, region)?;
            let mut items = query.query(client.as_ref()).await?;

            if items.len() > 1 {
                return Err(CloudError::ambiguous(subject, vec![region.to_string()]));
            }
            let Some(item) = items.pop() else {
                continue;
            };

            tracing::info!("Found {} in {}", subject, region);

            match policy {
                ScanPolicy::FirstMatch => {
                    return Ok(ScanOutcome::Found {
                        region: region.to_string(),
                        resource: item,
                    });
                }
                ScanPolicy::Unique => {
                    if let Some((first, _)) = &held {
                        return Err(CloudError::ambiguous(
                            subject,
                            vec![first.clone(), region.to_string()],
                        ));
                    }
                    held = Some((region.to_string(), item));
                }
                ScanPolicy::Refine(accept) => {
                    if accept(&item) {
                        return Ok(ScanOutcome::Found {
                            region: region.to_string(),
                            resource: item,
                        });
                    }
                    tracing::debug!("Match in {} does not satisfy refinement, continuing", region);
                    held = Some((region.to_string(), item));
                }
            }
        }

        Ok(match held {
            Some((region, resource)) => ScanOutcome::Found { region, resource },
            None => {
                tracing::info!("No {} in any of {} regions", subject, self.regions.len());
                ScanOutcome::NotFound
            }
        })
    }

    /// Every match in every region, in region order
    pub async fn collect<Q>(
        &self,
        credentials: &ScopedCredentials,
        query: &Q,
    ) -> Result<Vec<(String, Q::Item)>>
    where
        Q: RegionQuery + ?Sized,
    {
        let subject = query.describe();
        let mut found = Vec::new();

        for region in self.regions.iter() {
            tracing::info!("Checking region {} for {}", region, subject);
            let client = self.factory.client(credentials, region)?;
            for item in query.query(client.as_ref()).await? {
                found.push((region.to_string(), item));
            }
        }

        Ok(found)
    }
}
