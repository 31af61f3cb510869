use crate::utils::{self, Context};
use colored::Colorize;
use perch_cloud_aws::{NetworkScanner, Routing};

pub async fn handle(ctx: &Context, customer: &str, region: &str) -> anyhow::Result<()> {
    utils::check_customer(customer)?;
    let (identity, credentials) = ctx.locator()?.credentials_for(customer).await?;

    println!(
        "Networks of {} in {}",
        identity.customer_id.cyan(),
        region
    );
    let vpcs = NetworkScanner::new(&credentials, region, ctx.max_attempts())
        .scan()
        .await?;

    println!();
    if vpcs.is_empty() {
        println!("{}", "No VPCs found".dimmed());
        return Ok(());
    }

    for vpc in &vpcs {
        let default = if vpc.is_default {
            " (default)".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "{} {}{}  {} instances",
            vpc.vpc_id.cyan().bold(),
            vpc.cidr_block,
            default,
            vpc.instance_count
        );
        for subnet in &vpc.subnets {
            let routing = match subnet.routing {
                Routing::Public => subnet.routing.to_string().green(),
                Routing::Nat => subnet.routing.to_string().yellow(),
                Routing::Private => subnet.routing.to_string().dimmed(),
            };
            println!(
                "  {:<26} {:<12} {:<18} {:<8} {} instances",
                subnet.subnet_id,
                subnet.availability_zone,
                subnet.cidr_block,
                routing,
                subnet.instance_count
            );
        }
    }
    Ok(())
}
