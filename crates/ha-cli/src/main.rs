//! hapair - HA load-balancer pair provisioner

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hapair::commands::{FailoverCommand, InterfaceCommand, LoadBalancerCommand, ShowConfigCommand};
use hapair::context::AppContext;

#[derive(Parser)]
#[command(name = "hapair")]
#[command(about = "HA load-balancer pair provisioner")]
#[command(version)]
#[command(long_about = "
HA load-balancer pair provisioner

Configures one node of an active/passive pair: regenerates the load
balancer's backend pool, writes the VRRP failover daemon configuration for
the floating address and assigns the node address to its interface.

Examples:
  hapair load-balancer                         # Rebuild backend pool, reload
  hapair load-balancer --hostname web-lb1      # Force the app-server role
  hapair failover                              # Configure and restart failover
  hapair interface -i eth1                     # Assign the node address to eth1
  hapair --user-data /mnt/openstack/user_data show-config
")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Settings file (default /etc/hapair/hapair.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Heat user-data property file (key=value;key=value)
    #[arg(short, long, global = true)]
    user_data: Option<PathBuf>,

    /// Use this hostname instead of the kernel's
    #[arg(long, global = true)]
    hostname: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate the load-balancer backend pool and reload the daemon
    LoadBalancer {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configure the failover daemon for the floating address
    Failover {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assign the node address to its interface and bring it up
    Interface {
        /// Interface to configure instead of the discovered one
        #[arg(short, long)]
        interface: Option<String>,

        /// Print the assignment as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as JSON
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let result = run(&cli).await;

    match result {
        Ok(()) => {
            if !cli.quiet {
                log::info!("Command completed successfully");
            }
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);

            // Print error chain if in verbose mode
            if cli.verbose || cli.debug {
                for cause in e.chain().skip(1) {
                    eprintln!("  Caused by: {}", cause);
                }
            }
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let context = AppContext::bootstrap(
        cli.config.as_deref(),
        cli.user_data.as_deref(),
        cli.hostname.clone(),
    )
    .await?;

    match &cli.command {
        Commands::LoadBalancer { json } => {
            LoadBalancerCommand::new(context).execute(*json).await?;
        }

        Commands::Failover { json } => {
            FailoverCommand::new(context).execute(*json).await?;
        }

        Commands::Interface { interface, json } => {
            InterfaceCommand::new(context)
                .execute(interface.as_deref(), *json)
                .await?;
        }

        Commands::ShowConfig => ShowConfigCommand::new(context).execute()?,
    }

    Ok(())
}
