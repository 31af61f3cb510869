//! Stack templates published to per-region S3 buckets
//!
//! Each region has its own bucket named `<bucket_prefix>-<region>`. Buckets in
//! the primary region are addressed through the global endpoint, every other
//! region through `s3-<region>`.

use crate::error::AwsError;
use async_trait::async_trait;
use perch_cloud::{Result, TemplateSource};

pub const DEFAULT_PRIMARY_REGION: &str = "us-east-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLocation {
    pub bucket_prefix: String,
    /// Key prefix inside the bucket, e.g. `beta`
    pub path: String,
    pub primary_region: String,
}

impl Default for TemplateLocation {
    fn default() -> Self {
        Self {
            bucket_prefix: "bastion-cf".to_string(),
            path: "beta".to_string(),
            primary_region: DEFAULT_PRIMARY_REGION.to_string(),
        }
    }
}

impl TemplateLocation {
    /// URL of `name` for `region`
    pub fn url(&self, region: &str, name: &str) -> String {
        let host = if region == self.primary_region {
            "s3.amazonaws.com".to_string()
        } else {
            format!("s3-{}.amazonaws.com", region)
        };

        let mut segments = vec![format!("{}-{}", self.bucket_prefix, region)];
        segments.extend(
            self.path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        segments.push(name.trim_start_matches('/').to_string());

        format!("https://{}/{}", host, segments.join("/"))
    }
}

/// Downloads templates over HTTPS
pub struct S3TemplateSource {
    client: reqwest::Client,
    location: TemplateLocation,
}

impl S3TemplateSource {
    pub fn new(location: TemplateLocation) -> Self {
        Self {
            client: reqwest::Client::new(),
            location,
        }
    }

    pub fn location(&self) -> &TemplateLocation {
        &self.location
    }
}

#[async_trait]
impl TemplateSource for S3TemplateSource {
    async fn fetch_template(&self, region: &str, name: &str) -> Result<Vec<u8>> {
        let url = self.location.url(region, name);
        tracing::info!("Fetching template {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(AwsError::from)?;

        if !response.status().is_success() {
            return Err(AwsError::TemplateStatus {
                url,
                status: response.status().as_u16(),
            }
            .into());
        }

        let body = response.bytes().await.map_err(AwsError::from)?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regional_url() {
        let location = TemplateLocation::default();
        assert_eq!(
            location.url("eu-west-1", "bastion-cf.template"),
            "https://s3-eu-west-1.amazonaws.com/bastion-cf-eu-west-1/beta/bastion-cf.template"
        );
    }

    #[test]
    fn test_primary_region_uses_global_endpoint() {
        let location = TemplateLocation::default();
        assert_eq!(
            location.url("us-east-1", "bastion-cf.template"),
            "https://s3.amazonaws.com/bastion-cf-us-east-1/beta/bastion-cf.template"
        );
    }

    #[test]
    fn test_nested_and_empty_paths() {
        let mut location = TemplateLocation {
            bucket_prefix: "tmpl".into(),
            path: "/release/v2/".into(),
            primary_region: "us-east-1".into(),
        };
        assert_eq!(
            location.url("us-west-2", "x.template"),
            "https://s3-us-west-2.amazonaws.com/tmpl-us-west-2/release/v2/x.template"
        );

        location.path = String::new();
        assert_eq!(
            location.url("us-east-1", "x.template"),
            "https://s3.amazonaws.com/tmpl-us-east-1/x.template"
        );
    }
}
