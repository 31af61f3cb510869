use crate::utils::{self, Context};
use colored::Colorize;
use perch_cloud_aws::{PolicyDocument, RolePolicyManager};
use std::path::Path;

pub async fn creds(ctx: &Context, customer: &str) -> anyhow::Result<()> {
    utils::check_customer(customer)?;
    let (identity, credentials) = ctx.locator()?.credentials_for(customer).await?;

    println!(
        "Customer: {} ({})",
        identity.customer_id.cyan(),
        identity.email
    );
    println!("Credentials: {}", credentials.redacted());
    Ok(())
}

pub async fn update_policy(
    ctx: &Context,
    customer: &str,
    policy_file: Option<&Path>,
) -> anyhow::Result<()> {
    utils::check_customer(customer)?;
    let document = match policy_file {
        Some(path) => PolicyDocument::from_file(path)?,
        None => PolicyDocument::bundled()?,
    };

    let (identity, credentials) = ctx.locator()?.credentials_for(customer).await?;
    let manager = RolePolicyManager::new(
        &credentials,
        ctx.config.role_settings(),
        ctx.max_attempts(),
    );
    let policy = manager.find(&identity.customer_id).await?;

    println!(
        "Policy {} on role {} ({} statements)",
        policy.policy_name.cyan(),
        policy.role_name.cyan(),
        document.statement_count()
    );

    if ctx.dry_run {
        println!("{}", "Dry run: policy not replaced".yellow());
        return Ok(());
    }

    manager.replace(&policy, &document).await?;
    println!("{}", "✓ Policy replaced".green());
    Ok(())
}
