mod commands;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use perch_cloud::CloudError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "perch")]
#[command(about = "Find customer bastions in any region and manage their stacks", long_about = None)]
struct Cli {
    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show what would change without modifying anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Configuration file (default: PERCH_CONFIG, ./.perch.yaml, ~/.perch.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bastion instances
    #[command(subcommand)]
    Bastion(BastionCommands),
    /// Bastion CloudFormation stacks
    #[command(subcommand)]
    Stack(StackCommands),
    /// Bastion machine images
    #[command(subcommand)]
    Ami(AmiCommands),
    /// Customer roles and credentials
    #[command(subcommand)]
    Role(RoleCommands),
    /// List VPCs and subnets in a region
    Scan {
        /// Customer email or customer id
        customer: String,
        #[arg(short, long)]
        region: String,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum BastionCommands {
    /// List the customer's bastion instances in every region
    List { customer: String },
    /// Reboot a bastion instance
    Restart {
        customer: String,
        bastion_id: String,
    },
    /// Terminate a bastion instance
    Terminate {
        customer: String,
        bastion_id: String,
        /// Confirm termination
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum StackCommands {
    /// Show the customer's stack
    Print { customer: String },
    /// Show the decoded user data of the customer's stack
    Userdata { customer: String },
    /// Show recent stack events, newest first
    Events {
        customer: String,
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
        /// Stack name instead of the customer's default
        #[arg(long)]
        stack: Option<String>,
    },
    /// Update the customer's stack in place
    Update {
        customer: String,
        #[arg(long, conflicts_with = "latest")]
        ami_id: Option<String>,
        /// Use the newest stable bastion image in the stack's region
        #[arg(long)]
        latest: bool,
        #[arg(long, value_name = "BOOL")]
        allow_ssh: Option<bool>,
        /// Refresh user data, removing known bad fragments
        #[arg(long)]
        userdata: bool,
        /// Wait for the update to finish
        #[arg(long)]
        wait: bool,
    },
    /// Create a stack for a new bastion
    Create {
        customer: String,
        bastion_id: String,
        #[arg(long)]
        region: String,
        #[arg(long)]
        vpc: String,
        #[arg(long)]
        subnet: String,
        /// File holding the instance user data
        #[arg(long, value_name = "FILE")]
        user_data: PathBuf,
        #[arg(long, conflicts_with = "latest", required_unless_present = "latest")]
        ami_id: Option<String>,
        #[arg(long)]
        latest: bool,
        #[arg(long)]
        instance_type: Option<String>,
        #[arg(long, value_name = "BOOL")]
        allow_ssh: Option<bool>,
        #[arg(long)]
        wait: bool,
    },
    /// Wait until the customer's stack reaches a terminal status
    Wait { customer: String },
}

#[derive(Subcommand)]
enum AmiCommands {
    /// List bastion images, newest first
    List {
        /// Region (default: templates.primary_region)
        #[arg(short, long)]
        region: Option<String>,
        /// Show at most N images
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Only images tagged with this release
        #[arg(long)]
        release: Option<String>,
    },
}

#[derive(Subcommand)]
enum RoleCommands {
    /// Show the customer's scoped credentials (redacted)
    Creds { customer: String },
    /// Replace the customer's inline role policy
    UpdatePolicy {
        customer: String,
        /// Policy document to install instead of the bundled one
        #[arg(long, value_name = "FILE")]
        policy_file: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if is_user_error(&e) {
                eprintln!();
                eprintln!("{}", "Run 'perch --help' for usage.".yellow());
            }
            ExitCode::FAILURE
        }
    }
}

fn is_user_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CloudError>()
        .is_some_and(CloudError::is_user_error)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // version needs no configuration
    if matches!(cli.command, Commands::Version) {
        println!("perch {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = perch_config::Config::load(cli.config.as_deref())?;
    tracing::debug!("Scanning regions: {}", config.regions.join(", "));
    let ctx = utils::Context::new(config, cli.dry_run, cli.verbose);
    if ctx.dry_run {
        println!("{}", "Dry run: nothing will be modified".yellow().bold());
    }

    match cli.command {
        Commands::Bastion(cmd) => match cmd {
            BastionCommands::List { customer } => {
                commands::bastion::list(&ctx, &customer).await?;
            }
            BastionCommands::Restart {
                customer,
                bastion_id,
            } => {
                commands::bastion::restart(&ctx, &customer, &bastion_id).await?;
            }
            BastionCommands::Terminate {
                customer,
                bastion_id,
                yes,
            } => {
                commands::bastion::terminate(&ctx, &customer, &bastion_id, yes).await?;
            }
        },
        Commands::Stack(cmd) => match cmd {
            StackCommands::Print { customer } => {
                commands::stack::print(&ctx, &customer).await?;
            }
            StackCommands::Userdata { customer } => {
                commands::stack::userdata(&ctx, &customer).await?;
            }
            StackCommands::Events {
                customer,
                count,
                stack,
            } => {
                commands::stack::events(&ctx, &customer, count, stack.as_deref()).await?;
            }
            StackCommands::Update {
                customer,
                ami_id,
                latest,
                allow_ssh,
                userdata,
                wait,
            } => {
                let args = commands::stack::UpdateArgs {
                    image: commands::stack::ImageChoice::from_flags(ami_id, latest),
                    allow_ssh,
                    refresh_user_data: userdata,
                    wait,
                };
                commands::stack::update(&ctx, &customer, args).await?;
            }
            StackCommands::Create {
                customer,
                bastion_id,
                region,
                vpc,
                subnet,
                user_data,
                ami_id,
                latest,
                instance_type,
                allow_ssh,
                wait,
            } => {
                let args = commands::stack::CreateArgs {
                    bastion_id,
                    region,
                    vpc,
                    subnet,
                    user_data,
                    image: commands::stack::ImageChoice::from_flags(ami_id, latest),
                    instance_type,
                    allow_ssh,
                    wait,
                };
                commands::stack::create(&ctx, &customer, args).await?;
            }
            StackCommands::Wait { customer } => {
                commands::stack::wait(&ctx, &customer).await?;
            }
        },
        Commands::Ami(AmiCommands::List {
            region,
            limit,
            release,
        }) => {
            commands::ami::list(&ctx, region.as_deref(), limit, release.as_deref()).await?;
        }
        Commands::Role(cmd) => match cmd {
            RoleCommands::Creds { customer } => {
                commands::role::creds(&ctx, &customer).await?;
            }
            RoleCommands::UpdatePolicy {
                customer,
                policy_file,
            } => {
                commands::role::update_policy(&ctx, &customer, policy_file.as_deref()).await?;
            }
        },
        Commands::Scan { customer, region } => {
            commands::scan::handle(&ctx, &customer, &region).await?;
        }
        Commands::Version => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["perch", "stack", "print", "a@example.com", "--dry-run", "-v"])
            .unwrap();
        assert!(cli.dry_run);
        assert!(cli.verbose);
    }

    #[test]
    fn test_update_rejects_ami_and_latest_together() {
        let result = Cli::try_parse_from([
            "perch", "stack", "update", "a@example.com", "--ami-id", "ami-1", "--latest",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_allow_ssh_takes_a_bool() {
        let cli = Cli::try_parse_from([
            "perch", "stack", "update", "a@example.com", "--allow-ssh", "false",
        ])
        .unwrap();
        match cli.command {
            Commands::Stack(StackCommands::Update { allow_ssh, .. }) => {
                assert_eq!(allow_ssh, Some(false))
            }
            _ => panic!("expected stack update"),
        }

        assert!(
            Cli::try_parse_from(["perch", "stack", "update", "a@example.com", "--allow-ssh", "maybe"])
                .is_err()
        );
    }

    #[test]
    fn test_user_error_detection() {
        let err = anyhow::Error::from(CloudError::user_input("bad id"));
        assert!(is_user_error(&err));
        let err = anyhow::Error::from(CloudError::Timeout("stack".into()));
        assert!(!is_user_error(&err));
    }
}
