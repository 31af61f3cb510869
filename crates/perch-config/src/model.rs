//! Configuration file model
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! complete configuration apart from the service URLs.

use perch_cloud::StackPolicy;
use perch_cloud::region::DEFAULT_REGIONS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Regions scanned, in order
    pub regions: Vec<String>,
    pub services: ServicesConfig,
    pub stack: StackConfig,
    pub templates: TemplatesConfig,
    pub tags: TagsConfig,
    pub aws: AwsConfig,
    pub ami: AmiConfig,
    pub role: RoleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            regions: DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect(),
            services: ServicesConfig::default(),
            stack: StackConfig::default(),
            templates: TemplatesConfig::default(),
            tags: TagsConfig::default(),
            aws: AwsConfig::default(),
            ami: AmiConfig::default(),
            role: RoleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub identity_url: Option<String>,
    pub credentials_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            identity_url: None,
            credentials_url: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub prefix: String,
    /// Template file name inside the template bucket
    pub template: String,
    pub capabilities: Vec<String>,
    pub stack_policy: StackPolicy,
    pub poll_interval_secs: u64,
    pub poll_max_interval_secs: u64,
    pub poll_multiplier: f64,
    pub wait_timeout_secs: u64,
    /// Fragment removed from user data on refresh
    pub user_data_strip: Option<String>,
    pub instance_type: String,
    pub associate_public_ip_address: bool,
    pub allow_ssh: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            prefix: perch_cloud::model::DEFAULT_STACK_PREFIX.to_string(),
            template: "bastion-cf.template".to_string(),
            capabilities: vec!["CAPABILITY_IAM".to_string()],
            stack_policy: StackPolicy::Unique,
            poll_interval_secs: 10,
            poll_max_interval_secs: 60,
            poll_multiplier: 1.5,
            wait_timeout_secs: 30 * 60,
            user_data_strip: None,
            instance_type: "t3.micro".to_string(),
            associate_public_ip_address: true,
            allow_ssh: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub bucket_prefix: String,
    pub path: String,
    pub primary_region: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        let location = perch_cloud_aws::TemplateLocation::default();
        Self {
            bucket_prefix: location.bucket_prefix,
            path: location.path,
            primary_region: location.primary_region,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagsConfig {
    pub customer: String,
    pub bastion: String,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            customer: "CustomerId".to_string(),
            bastion: "BastionId".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub max_attempts: u32,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            max_attempts: perch_cloud_aws::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmiConfig {
    pub owner_id: String,
    pub tag_key: String,
    pub tag_value: String,
    pub stable_release: String,
}

impl Default for AmiConfig {
    fn default() -> Self {
        let settings = perch_cloud_aws::AmiSettings::default();
        Self {
            owner_id: settings.owner_id,
            tag_key: settings.tag_key,
            tag_value: settings.tag_value,
            stable_release: settings.stable_release,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub role_prefix: String,
    pub policy_prefix: String,
}

impl Default for RoleConfig {
    fn default() -> Self {
        let settings = perch_cloud_aws::RoleSettings::default();
        Self {
            role_prefix: settings.role_prefix,
            policy_prefix: settings.policy_prefix,
        }
    }
}
