//! fleetsync: mirror scraper status into a spreadsheet and export it.
//!
//! # Usage
//!
//! ```text
//! fleetsync run [--spreadsheet <id>] [--prometheus-port N] [--webserver-port N] ...
//! fleetsync status [--filter <substr>] [--json]
//! fleetsync sync [--dry-run]
//! fleetsync diff
//! fleetsync deployed [--json]
//! ```
//!
//! Every command accepts `--config <path>` (default `~/.fleetsync/config.yaml`)
//! and `--store-file <path>` to read records from a local JSON file instead of
//! the datastore.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    deployed::DeployedArgs, diff::DiffArgs, run::RunArgs, status::StatusArgs, sync::SyncArgs,
    GlobalOpts,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "fleetsync",
    version,
    about = "Keep the scraper status spreadsheet and metrics in sync with the datastore",
    long_about = None,
)]
struct Cli {
    /// Config file to load instead of ~/.fleetsync/config.yaml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read status records from this JSON file instead of the datastore.
    #[arg(long, global = true)]
    store_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sync loop, status page and metrics endpoint.
    Run(RunArgs),

    /// Print the current status records.
    Status(StatusArgs),

    /// Run one sync cycle against the spreadsheet.
    Sync(SyncArgs),

    /// Show a unified diff of what the next sync would write.
    Diff(DiffArgs),

    /// Print the identifiers currently deployed.
    Deployed(DeployedArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = GlobalOpts {
        config: cli.config,
        store_file: cli.store_file,
    };
    match cli.command {
        Commands::Run(args) => args.run(&opts),
        Commands::Status(args) => args.run(&opts),
        Commands::Sync(args) => args.run(&opts),
        Commands::Diff(args) => args.run(&opts),
        Commands::Deployed(args) => args.run(&opts),
    }
}
