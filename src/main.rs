mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use pmdraft::config::Config;
use pmdraft::context::DraftContext;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = DraftContext::open(config)?;

    match cli.command {
        Commands::Show(args) => commands::show(&ctx, args).await?,
        Commands::Check(args) => commands::check(&ctx, args).await?,
        Commands::Purge(args) => commands::purge(&ctx, args).await?,
        Commands::List => commands::list(&ctx).await?,
    }

    ctx.metadata.persist()?;
    Ok(())
}
