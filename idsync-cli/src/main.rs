//! idsync: mirror directory users, organizations and memberships into the
//! collaboration platform.
//!
//! # Usage
//!
//! ```text
//! idsync [daemon] [--json] [--dry-run]
//! idsync sync [--dry-run]
//! idsync plan [--json]
//! ```
//!
//! Every subcommand reads its configuration from the environment.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonArgs, plan::PlanArgs, sync::SyncArgs};

#[derive(Parser, Debug)]
#[command(
    name = "idsync",
    version,
    about = "Reconcile Keycloak users, groups and memberships into Gitea",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile forever on the configured interval (default).
    Daemon(DaemonArgs),

    /// Run a single reconciliation pass and exit.
    Sync(SyncArgs),

    /// Print the operations the next pass would issue.
    Plan(PlanArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        None => DaemonArgs::default().run(),
        Some(Commands::Daemon(args)) => args.run(),
        Some(Commands::Sync(args)) => args.run(),
        Some(Commands::Plan(args)) => args.run(),
    }
}
