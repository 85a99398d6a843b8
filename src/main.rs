mod commands;
mod config;
mod digest;
mod feed;
mod notify;
mod reconcile;
mod state;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::Config;

#[derive(Parser)]
#[command(name = "daysync")]
#[command(about = "Mirror a Google Calendar into a Notion task database and publish a daily Discord digest")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Periodic entry point: sync the calendar if due, then post or edit the digest
    Run,
    /// Force a calendar sync now, ignoring the sync interval
    Sync,
    /// Print the digest for the current effective date without publishing
    Digest,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    match cli.command {
        Commands::Run => commands::run::run(&cfg).await,
        Commands::Sync => commands::sync::run(&cfg).await,
        Commands::Digest => commands::digest::run(&cfg).await,
    }
}
