use crate::utils::{self, Context};
use colored::Colorize;
use perch_cloud::{CloudError, parse_bastion_id};

pub async fn list(ctx: &Context, customer: &str) -> anyhow::Result<()> {
    utils::check_customer(customer)?;
    let locator = ctx.locator()?;

    println!("{}", "Searching bastions...".blue());
    let inventory = locator.list_instances(customer).await?;

    println!(
        "Customer: {} ({})",
        inventory.identity.customer_id.cyan(),
        inventory.identity.email
    );
    println!();

    if inventory.instances.is_empty() {
        println!("{}", "No bastion instances found".dimmed());
        return Ok(());
    }

    let bastion_tag = &ctx.config.tags.bastion;
    utils::print_header(
        &format!(
            "{:<15} {:<21} {:<14} {:<12} {:<38} {:<16} {:<16} {}",
            "REGION", "INSTANCE", "STATE", "TYPE", "BASTION", "PRIVATE IP", "PUBLIC IP", "LAUNCHED"
        ),
        150,
    );

    for (region, instance) in &inventory.instances {
        let launched = instance
            .launch_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:<15} {:<21} {:<14} {:<12} {:<38} {:<16} {:<16} {}",
            region,
            instance.instance_id.cyan(),
            utils::state_colored(&instance.state),
            instance.instance_type.as_deref().unwrap_or("-"),
            instance.tag(bastion_tag).unwrap_or("-"),
            instance.private_ip.as_deref().unwrap_or("-"),
            instance.public_ip.as_deref().unwrap_or("-"),
            launched.dimmed()
        );
    }

    Ok(())
}

pub async fn restart(ctx: &Context, customer: &str, bastion_id: &str) -> anyhow::Result<()> {
    utils::check_customer(customer)?;
    parse_bastion_id(bastion_id)?;
    let locator = ctx.locator()?;

    let located = locator.locate_instance(customer, bastion_id).await?.require()?;
    println!(
        "Found {} in {} ({})",
        located.resource.instance_id.cyan(),
        located.region,
        utils::state_colored(&located.resource.state)
    );

    if ctx.orchestrator().reboot_instance(&located).await? {
        println!("{}", "✓ Reboot requested".green());
    } else {
        println!("{}", "Would reboot this instance".yellow());
    }
    Ok(())
}

pub async fn terminate(
    ctx: &Context,
    customer: &str,
    bastion_id: &str,
    yes: bool,
) -> anyhow::Result<()> {
    utils::check_customer(customer)?;
    parse_bastion_id(bastion_id)?;
    if !yes && !ctx.dry_run {
        return Err(CloudError::user_input("terminating a bastion requires --yes").into());
    }
    let locator = ctx.locator()?;

    let located = locator.locate_instance(customer, bastion_id).await?.require()?;
    println!(
        "Found {} in {} ({})",
        located.resource.instance_id.cyan(),
        located.region,
        utils::state_colored(&located.resource.state)
    );

    if ctx.orchestrator().terminate_instance(&located).await? {
        println!("{}", "✓ Termination requested".green());
    } else {
        println!("{}", "Would terminate this instance".yellow());
    }
    Ok(())
}
