use crate::utils::{self, Context};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use colored::Colorize;
use perch_cloud::model::{
    PARAM_ALLOW_SSH, PARAM_ASSOCIATE_PUBLIC_IP, PARAM_BASTION_ID, PARAM_CUSTOMER_ID,
    PARAM_IMAGE_ID, PARAM_INSTANCE_TYPE, PARAM_SUBNET_ID, PARAM_USER_DATA, PARAM_VPC_ID,
};
use perch_cloud::params::decode_user_data;
use perch_cloud::{
    ApplyOutcome, CloudError, LifecycleOrchestrator, Location, ParameterOverrides,
    ScopedCredentials, StackDescription, StackPlan, parse_bastion_id, stack_name,
    strip_known_fragment,
};
use std::path::PathBuf;

/// Which machine image a create or update should use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChoice {
    Keep,
    Given(String),
    /// Newest stable image in the target region
    Latest,
}

impl ImageChoice {
    pub fn from_flags(ami_id: Option<String>, latest: bool) -> Self {
        match (ami_id, latest) {
            (Some(id), _) => ImageChoice::Given(id),
            (None, true) => ImageChoice::Latest,
            (None, false) => ImageChoice::Keep,
        }
    }

    async fn resolve(&self, ctx: &Context, region: &str) -> anyhow::Result<Option<String>> {
        match self {
            ImageChoice::Keep => Ok(None),
            ImageChoice::Given(id) => Ok(Some(id.clone())),
            ImageChoice::Latest => {
                let image = ctx.ami_catalog().latest(region).await?;
                println!(
                    "Latest image in {}: {} ({} {})",
                    region,
                    image.image_id.cyan(),
                    image.name,
                    image.short_sha().dimmed()
                );
                Ok(Some(image.image_id))
            }
        }
    }
}

pub struct UpdateArgs {
    pub image: ImageChoice,
    pub allow_ssh: Option<bool>,
    pub refresh_user_data: bool,
    pub wait: bool,
}

pub struct CreateArgs {
    pub bastion_id: String,
    pub region: String,
    pub vpc: String,
    pub subnet: String,
    pub user_data: PathBuf,
    pub image: ImageChoice,
    pub instance_type: Option<String>,
    pub allow_ssh: Option<bool>,
    pub wait: bool,
}

async fn locate(
    ctx: &Context,
    customer: &str,
    stack: Option<&str>,
) -> anyhow::Result<Location<StackDescription>> {
    utils::check_customer(customer)?;
    let locator = ctx.locator()?;
    println!("{}", "Searching stacks...".blue());
    let location = match stack {
        Some(name) => locator.locate_stack_named(customer, name).await?,
        None => locator.locate_stack(customer).await?,
    };
    Ok(location)
}

pub async fn print(ctx: &Context, customer: &str) -> anyhow::Result<()> {
    let found = locate(ctx, customer, None).await?.require()?;
    let stack = &found.resource;

    println!();
    println!("Stack:    {}", stack.name.cyan().bold());
    println!("Region:   {}", found.region);
    println!("Status:   {}", utils::status_colored(&stack.status));
    if let Some(reason) = &stack.status_reason {
        println!("Reason:   {}", reason.dimmed());
    }
    println!("Customer: {} ({})", found.identity.customer_id, found.identity.email);

    println!();
    println!("{}", "Parameters:".bold());
    for param in &stack.parameters {
        let value = if param.key == PARAM_USER_DATA {
            format!("({} bytes, base64)", param.value.len())
        } else {
            param.value.clone()
        };
        println!("  {:<26} {}", param.key, value);
    }

    if !stack.tags.is_empty() {
        println!();
        println!("{}", "Tags:".bold());
        for tag in &stack.tags {
            println!("  {:<26} {}", tag.key, tag.value);
        }
    }
    Ok(())
}

pub async fn userdata(ctx: &Context, customer: &str) -> anyhow::Result<()> {
    let found = locate(ctx, customer, None).await?.require()?;
    let encoded = found.resource.parameter(PARAM_USER_DATA).ok_or_else(|| {
        CloudError::NotFound(format!("UserData parameter on stack {}", found.resource.name))
    })?;

    let decoded = decode_user_data(encoded)?;
    print!("{}", strip_known_fragment(&decoded, ctx.config.user_data_strip()));
    Ok(())
}

pub async fn events(
    ctx: &Context,
    customer: &str,
    count: usize,
    stack: Option<&str>,
) -> anyhow::Result<()> {
    let found = locate(ctx, customer, stack).await?.require()?;
    let events = ctx
        .orchestrator()
        .list_events(&found.credentials, &found.region, &found.resource.name, count)
        .await?;

    println!(
        "Stack {} in {}",
        found.resource.name.cyan(),
        found.region
    );
    println!();
    if events.is_empty() {
        println!("{}", "No events".dimmed());
        return Ok(());
    }

    let header = format!(
        "{:<20} {:<28} {:<30} {}",
        "TIME", "STATUS", "RESOURCE", "REASON"
    );
    if ctx.verbose {
        utils::print_header(&format!("{} / PHYSICAL ID", header), 130);
    } else {
        utils::print_header(&header, 110);
    }

    for event in &events {
        let status = &event.resource_status;
        let status_colored = if status.contains("FAILED") || status.contains("ROLLBACK") {
            status.red()
        } else if status.ends_with("_COMPLETE") {
            status.green()
        } else {
            status.cyan()
        };

        let mut line = format!(
            "{:<20} {:<28} {:<30} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            status_colored,
            event.logical_resource_id,
            event.reason.as_deref().unwrap_or("")
        );
        if ctx.verbose {
            if let Some(physical) = &event.physical_resource_id {
                line.push_str(&format!(" / {}", physical.dimmed()));
            }
        }
        println!("{}", line);
    }
    Ok(())
}

pub async fn update(ctx: &Context, customer: &str, args: UpdateArgs) -> anyhow::Result<()> {
    let location = locate(ctx, customer, None).await?;

    let mut overrides = ParameterOverrides::new();
    if args.image != ImageChoice::Keep {
        let region = location
            .region()
            .ok_or_else(|| {
                CloudError::NotFound(format!(
                    "stack for customer {}",
                    location.identity().customer_id
                ))
            })?
            .to_string();
        if let Some(image_id) = args.image.resolve(ctx, &region).await? {
            overrides = overrides.set(PARAM_IMAGE_ID, image_id);
        }
    }
    if let Some(allow_ssh) = args.allow_ssh {
        overrides = overrides.set(PARAM_ALLOW_SSH, allow_ssh.to_string());
    }
    if args.refresh_user_data {
        overrides = overrides.with_user_data_refresh(ctx.config.user_data_strip());
    }

    let orchestrator = ctx.orchestrator();
    let plan = orchestrator.plan_update(&location, &overrides).await?;
    submit(ctx, &orchestrator, &plan, location.credentials(), args.wait).await
}

pub async fn create(ctx: &Context, customer: &str, args: CreateArgs) -> anyhow::Result<()> {
    utils::check_customer(customer)?;
    let bastion_id = parse_bastion_id(&args.bastion_id)?;
    if !ctx.config.region_list()?.contains(&args.region) {
        return Err(CloudError::user_input(format!(
            "region {} is not in the configured region list",
            args.region
        ))
        .into());
    }
    let user_data = std::fs::read(&args.user_data).map_err(|e| {
        CloudError::user_input(format!(
            "cannot read user data {}: {}",
            args.user_data.display(),
            e
        ))
    })?;

    let location = locate(ctx, customer, None).await?;
    let customer_id = location.identity().customer_id.clone();
    let name = stack_name(&ctx.config.stack.prefix, &customer_id);

    let mut overrides = ParameterOverrides::new()
        .set(PARAM_CUSTOMER_ID, customer_id)
        .set(PARAM_BASTION_ID, bastion_id)
        .set(PARAM_VPC_ID, args.vpc)
        .set(PARAM_SUBNET_ID, args.subnet)
        .set(
            PARAM_INSTANCE_TYPE,
            args.instance_type
                .unwrap_or_else(|| ctx.config.stack.instance_type.clone()),
        )
        .set(
            PARAM_ASSOCIATE_PUBLIC_IP,
            ctx.config.stack.associate_public_ip_address.to_string(),
        )
        .set(
            PARAM_ALLOW_SSH,
            args.allow_ssh
                .unwrap_or(ctx.config.stack.allow_ssh)
                .to_string(),
        )
        .set(PARAM_USER_DATA, STANDARD.encode(user_data));
    if let Some(image_id) = args.image.resolve(ctx, &args.region).await? {
        overrides = overrides.set(PARAM_IMAGE_ID, image_id);
    }

    let orchestrator = ctx.orchestrator();
    let plan = orchestrator
        .plan_create(&location, &name, &args.region, &overrides)
        .await?;
    submit(ctx, &orchestrator, &plan, location.credentials(), args.wait).await
}

pub async fn wait(ctx: &Context, customer: &str) -> anyhow::Result<()> {
    let found = locate(ctx, customer, None).await?.require()?;
    println!(
        "Waiting for {} in {} ({})",
        found.resource.name.cyan(),
        found.region,
        utils::status_colored(&found.resource.status)
    );
    await_and_report(
        ctx,
        &ctx.orchestrator(),
        &found.credentials,
        &found.region,
        &found.resource.name,
    )
    .await
}

async fn submit(
    ctx: &Context,
    orchestrator: &LifecycleOrchestrator,
    plan: &StackPlan,
    credentials: &ScopedCredentials,
    wait: bool,
) -> anyhow::Result<()> {
    utils::print_plan(plan);

    match orchestrator.apply(plan, credentials).await? {
        ApplyOutcome::Skipped => {
            println!("{}", "Dry run: stack not submitted".yellow());
            Ok(())
        }
        ApplyOutcome::Submitted { stack_id } => {
            println!("{} {}", "✓ Submitted".green(), stack_id.dimmed());
            if wait {
                await_and_report(ctx, orchestrator, credentials, &plan.region, plan.stack_name())
                    .await
            } else {
                Ok(())
            }
        }
    }
}

async fn await_and_report(
    ctx: &Context,
    orchestrator: &LifecycleOrchestrator,
    credentials: &ScopedCredentials,
    region: &str,
    stack_name: &str,
) -> anyhow::Result<()> {
    println!("{}", "Waiting for stack to settle...".blue());
    let terminal = orchestrator
        .await_terminal(credentials, region, stack_name, &ctx.config.poll_config())
        .await?;

    println!(
        "Stack {} finished: {}",
        terminal.stack_name.cyan(),
        utils::status_colored(&terminal.status)
    );
    if terminal.succeeded() {
        return Ok(());
    }
    if let Some(reason) = &terminal.reason {
        println!("  {}", reason.dimmed());
    }
    anyhow::bail!(
        "stack {} ended in {}",
        terminal.stack_name,
        terminal.status
    )
}
