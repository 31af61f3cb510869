use colored::{ColoredString, Colorize};
use perch_cloud::{
    CredentialBroker, InstanceState, LifecycleOrchestrator, RegionScanner, ResourceLocator,
    StackOutcome, StackPlan, StackStatus, UserQuery,
};
use perch_cloud_aws::{AmiCatalog, AwsClientFactory, S3TemplateSource};
use perch_config::Config;
use perch_services::{HttpCredentialVendor, HttpIdentityResolver, ServiceEndpoint};
use std::sync::Arc;

/// Everything a command needs, built from configuration and global flags
pub struct Context {
    pub config: Config,
    pub dry_run: bool,
    pub verbose: bool,
}

impl Context {
    pub fn new(config: Config, dry_run: bool, verbose: bool) -> Self {
        Self {
            config,
            dry_run,
            verbose,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.aws.max_attempts
    }

    fn factory(&self) -> Arc<AwsClientFactory> {
        Arc::new(AwsClientFactory::new(self.max_attempts()))
    }

    pub fn locator(&self) -> anyhow::Result<ResourceLocator> {
        let timeout = self.config.service_timeout();
        let resolver =
            HttpIdentityResolver::new(ServiceEndpoint::new(self.config.identity_url()?, timeout)?)?;
        let vendor = HttpCredentialVendor::new(ServiceEndpoint::new(
            self.config.credentials_url()?,
            timeout,
        )?)?;

        let scanner = RegionScanner::new(self.config.region_list()?, self.factory());
        Ok(ResourceLocator::new(
            Arc::new(resolver),
            CredentialBroker::new(Arc::new(vendor)),
            scanner,
            self.config.locator_settings(),
        ))
    }

    pub fn orchestrator(&self) -> LifecycleOrchestrator {
        LifecycleOrchestrator::new(
            self.factory(),
            Arc::new(S3TemplateSource::new(self.config.template_location())),
            self.config.lifecycle_settings(),
            self.dry_run,
        )
    }

    pub fn ami_catalog(&self) -> AmiCatalog {
        AmiCatalog::new(self.config.ami_settings())
    }
}

/// Reject a malformed customer argument before any service is contacted
pub fn check_customer(customer: &str) -> anyhow::Result<()> {
    UserQuery::parse(customer)?;
    Ok(())
}

pub fn status_colored(status: &StackStatus) -> ColoredString {
    if status.is_in_progress() {
        return status.as_str().cyan();
    }
    match status.outcome() {
        StackOutcome::Succeeded => status.as_str().green(),
        StackOutcome::RolledBack => status.as_str().yellow(),
        StackOutcome::Failed => status.as_str().red(),
    }
}

pub fn state_colored(state: &InstanceState) -> ColoredString {
    match state {
        InstanceState::Running => state.to_string().green(),
        InstanceState::Pending | InstanceState::Stopping | InstanceState::ShuttingDown => {
            state.to_string().yellow()
        }
        _ => state.to_string().red(),
    }
}

/// Print a plan preview and its summary line
pub fn print_plan(plan: &StackPlan) {
    println!();
    for (i, line) in plan.preview().iter().enumerate() {
        if i == 0 {
            println!("{}", line.bold());
        } else {
            println!("{}", line);
        }
    }
    println!();
    println!("{}", plan.summary().to_string().dimmed());
}

/// Table header in the style used by every listing
pub fn print_header(line: &str, width: usize) {
    println!("{}", line.bold());
    println!("{}", "─".repeat(width).dimmed());
}
