//! perch configuration
//!
//! Configuration files are searched in this order:
//! 1. `--config <path>` (passed in as `explicit`)
//! 2. `PERCH_CONFIG` environment variable
//! 3. `./.perch.yaml`
//! 4. `~/.perch.yaml`
//! 5. `~/.config/perch/config.yaml`
//!
//! When nothing is found the built-in defaults are used. Environment
//! overrides are applied on top of whichever source won.

pub mod error;
pub mod model;

pub use error::{ConfigError, Result};
pub use model::{
    AmiConfig, AwsConfig, Config, RoleConfig, ServicesConfig, StackConfig, TagsConfig,
    TemplatesConfig,
};

use perch_cloud::params::DEFAULT_USER_DATA_STRIP;
use perch_cloud::{LifecycleSettings, LocatorSettings, PollConfig, RegionList};
use perch_cloud_aws::{AmiSettings, RoleSettings, TemplateLocation};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "PERCH_CONFIG";
pub const IDENTITY_URL_ENV: &str = "PERCH_IDENTITY_URL";
pub const CREDENTIALS_URL_ENV: &str = "PERCH_CREDENTIALS_URL";
pub const REGIONS_ENV: &str = "PERCH_REGIONS";

/// Upper bound for every polling and wait duration in the stack section
pub const MAX_WAIT_SECS: u64 = 24 * 60 * 60;

/// Locate the configuration file, if any
pub fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok(Some(path.to_path_buf()))
        } else {
            Err(ConfigError::FileNotFound(path.to_path_buf()))
        };
    }

    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        return if path.exists() {
            Ok(Some(path))
        } else {
            Err(ConfigError::FileNotFound(path))
        };
    }

    let local = std::env::current_dir()?.join(".perch.yaml");
    if local.exists() {
        return Ok(Some(local));
    }

    if let Some(home) = dirs::home_dir() {
        let dotfile = home.join(".perch.yaml");
        if dotfile.exists() {
            return Ok(Some(dotfile));
        }
        let xdg = home.join(".config").join("perch").join("config.yaml");
        if xdg.exists() {
            return Ok(Some(xdg));
        }
    }

    Ok(None)
}

impl Config {
    /// Discover, parse, apply environment overrides and validate
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match find_config_file(explicit)? {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(IDENTITY_URL_ENV) {
            self.services.identity_url = Some(url);
        }
        if let Ok(url) = std::env::var(CREDENTIALS_URL_ENV) {
            self.services.credentials_url = Some(url);
        }
        if let Ok(regions) = std::env::var(REGIONS_ENV) {
            let list = RegionList::parse(&regions)
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", REGIONS_ENV, e)))?;
            self.regions = list.iter().map(str::to_string).collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.region_list()?;
        if self.stack.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "stack.poll_interval_secs must be positive".to_string(),
            ));
        }
        for (key, secs) in [
            ("stack.poll_interval_secs", self.stack.poll_interval_secs),
            ("stack.poll_max_interval_secs", self.stack.poll_max_interval_secs),
            ("stack.wait_timeout_secs", self.stack.wait_timeout_secs),
        ] {
            if secs > MAX_WAIT_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{} must be at most {} seconds",
                    key, MAX_WAIT_SECS
                )));
            }
        }
        if !self.stack.poll_multiplier.is_finite() || self.stack.poll_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "stack.poll_multiplier must be at least 1.0".to_string(),
            ));
        }
        if self.aws.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "aws.max_attempts must be positive".to_string(),
            ));
        }
        if self.stack.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("stack.prefix must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn region_list(&self) -> Result<RegionList> {
        RegionList::new(&self.regions).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn identity_url(&self) -> Result<&str> {
        self.services
            .identity_url
            .as_deref()
            .ok_or(ConfigError::MissingService {
                key: "services.identity_url",
                env: IDENTITY_URL_ENV,
            })
    }

    pub fn credentials_url(&self) -> Result<&str> {
        self.services
            .credentials_url
            .as_deref()
            .ok_or(ConfigError::MissingService {
                key: "services.credentials_url",
                env: CREDENTIALS_URL_ENV,
            })
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.services.timeout_secs.max(1))
    }

    pub fn locator_settings(&self) -> LocatorSettings {
        LocatorSettings {
            stack_prefix: self.stack.prefix.clone(),
            stack_policy: self.stack.stack_policy,
            customer_tag: self.tags.customer.clone(),
            bastion_tag: self.tags.bastion.clone(),
        }
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            template_name: self.stack.template.clone(),
            capabilities: self.stack.capabilities.clone(),
            customer_tag: self.tags.customer.clone(),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.stack.poll_interval_secs),
            Duration::from_secs(self.stack.wait_timeout_secs),
        )
        .with_backoff(
            self.stack.poll_multiplier,
            Duration::from_secs(self.stack.poll_max_interval_secs),
        )
    }

    /// Fragment stripped from user data on `--userdata` refreshes
    pub fn user_data_strip(&self) -> &str {
        self.stack
            .user_data_strip
            .as_deref()
            .unwrap_or(DEFAULT_USER_DATA_STRIP)
    }

    pub fn template_location(&self) -> TemplateLocation {
        TemplateLocation {
            bucket_prefix: self.templates.bucket_prefix.clone(),
            path: self.templates.path.clone(),
            primary_region: self.templates.primary_region.clone(),
        }
    }

    pub fn ami_settings(&self) -> AmiSettings {
        AmiSettings {
            owner_id: self.ami.owner_id.clone(),
            tag_key: self.ami.tag_key.clone(),
            tag_value: self.ami.tag_value.clone(),
            stable_release: self.ami.stable_release.clone(),
            max_attempts: self.aws.max_attempts,
        }
    }

    pub fn role_settings(&self) -> RoleSettings {
        RoleSettings {
            role_prefix: self.role.role_prefix.clone(),
            policy_prefix: self.role.policy_prefix.clone(),
        }
    }
}
