//! Bastion machine images
//!
//! Images are looked up with the operator's own AWS credentials (default
//! provider chain), not the customer's scoped credentials.

use crate::error::{AwsError, Result};
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2 as ec2;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmiSettings {
    /// Owner filter passed to DescribeImages, an account id or `self`
    pub owner_id: String,
    pub tag_key: String,
    pub tag_value: String,
    /// Release tag used by `latest`
    pub stable_release: String,
    pub max_attempts: u32,
}

impl Default for AmiSettings {
    fn default() -> Self {
        Self {
            owner_id: "self".to_string(),
            tag_key: "component".to_string(),
            tag_value: "bastion".to_string(),
            stable_release: "stable".to_string(),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BastionImage {
    pub image_id: String,
    pub name: String,
    /// ISO-8601 as reported by EC2, sorts lexically
    pub creation_date: String,
    pub sha: Option<String>,
    pub release: Option<String>,
}

impl BastionImage {
    /// Build sha shortened to 8 characters
    pub fn short_sha(&self) -> &str {
        match &self.sha {
            Some(sha) => sha.get(..8).unwrap_or(sha),
            None => "",
        }
    }
}

/// Newest first, optionally capped at `limit`
pub fn sort_newest_first(mut images: Vec<BastionImage>, limit: Option<usize>) -> Vec<BastionImage> {
    images.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
    if let Some(limit) = limit {
        images.truncate(limit);
    }
    images
}

pub struct AmiCatalog {
    settings: AmiSettings,
}

impl AmiCatalog {
    pub fn new(settings: AmiSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AmiSettings {
        &self.settings
    }

    async fn client(&self, region: &str) -> ec2::Client {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .retry_config(RetryConfig::standard().with_max_attempts(self.settings.max_attempts.max(1)))
            .load()
            .await;
        ec2::Client::new(&config)
    }

    /// Bastion images in `region`, optionally restricted to one release tag
    pub async fn list(
        &self,
        region: &str,
        release: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<BastionImage>> {
        let mut filters = vec![
            ec2::types::Filter::builder()
                .name(format!("tag:{}", self.settings.tag_key))
                .values(&self.settings.tag_value)
                .build(),
        ];
        if let Some(release) = release {
            filters.push(
                ec2::types::Filter::builder()
                    .name("tag:release")
                    .values(release)
                    .build(),
            );
        }

        let response = self
            .client(region)
            .await
            .describe_images()
            .owners(&self.settings.owner_id)
            .set_filters(Some(filters))
            .send()
            .await
            .map_err(|e| AwsError::api("DescribeImages", e))?;

        let images = response.images().iter().map(convert_image).collect();
        Ok(sort_newest_first(images, limit))
    }

    /// Newest image of the stable release
    pub async fn latest(&self, region: &str) -> Result<BastionImage> {
        tracing::info!("Requesting latest {} image in {}", self.settings.stable_release, region);
        self.list(region, Some(&self.settings.stable_release), Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AwsError::NoImages(format!(
                    "with release {} in {}",
                    self.settings.stable_release, region
                ))
            })
    }
}

fn convert_image(image: &ec2::types::Image) -> BastionImage {
    let tag = |key: &str| {
        image
            .tags()
            .iter()
            .find(|t| t.key() == Some(key))
            .and_then(|t| t.value())
            .map(str::to_string)
    };

    BastionImage {
        image_id: image.image_id().unwrap_or_default().to_string(),
        name: image.name().unwrap_or_default().to_string(),
        creation_date: image.creation_date().unwrap_or_default().to_string(),
        sha: tag("sha"),
        release: tag("release"),
    }
}
