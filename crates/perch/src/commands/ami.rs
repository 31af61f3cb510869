use crate::utils::{self, Context};
use colored::Colorize;

pub async fn list(
    ctx: &Context,
    region: Option<&str>,
    limit: Option<usize>,
    release: Option<&str>,
) -> anyhow::Result<()> {
    let region = region.unwrap_or(&ctx.config.templates.primary_region);
    let catalog = ctx.ami_catalog();

    println!("{}", format!("Bastion images in {}", region).blue());
    let images = catalog.list(region, release, limit).await?;

    println!();
    if images.is_empty() {
        println!("{}", "No images found".dimmed());
        return Ok(());
    }

    utils::print_header(
        &format!(
            "{:<22} {:<26} {:<10} {:<10} {}",
            "IMAGE", "CREATED", "RELEASE", "SHA", "NAME"
        ),
        100,
    );
    for image in &images {
        println!(
            "{:<22} {:<26} {:<10} {:<10} {}",
            image.image_id.cyan(),
            image.creation_date,
            image.release.as_deref().unwrap_or("-"),
            image.short_sha().dimmed(),
            image.name
        );
    }
    Ok(())
}
