//! Ordered candidate regions

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};

/// Regions scanned when no list is configured, in scan order
pub const DEFAULT_REGIONS: &[&str] = &[
    "us-west-1",
    "us-west-2",
    "us-east-1",
    "eu-west-1",
    "eu-central-1",
    "sa-east-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "ap-northeast-2",
];

/// Ordered, non-empty list of candidate regions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct RegionList(Vec<String>);

impl RegionList {
    pub fn new<I, S>(regions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for region in regions {
            let region = region.into().trim().to_string();
            if region.is_empty() {
                continue;
            }
            if !list.contains(&region) {
                list.push(region);
            }
        }

        if list.is_empty() {
            return Err(CloudError::InvalidConfig(
                "region list must contain at least one region".to_string(),
            ));
        }
        Ok(Self(list))
    }

    /// Parse a comma separated list such as `us-west-1,eu-west-1`
    pub fn parse(raw: &str) -> Result<Self> {
        Self::new(raw.split(','))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, region: &str) -> bool {
        self.0.iter().any(|r| r == region)
    }
}

impl Default for RegionList {
    fn default() -> Self {
        Self(DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect())
    }
}

impl TryFrom<Vec<String>> for RegionList {
    type Error = CloudError;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RegionList> for Vec<String> {
    fn from(value: RegionList) -> Self {
        value.0
    }
}
