mod cli;
mod send;

use clap::Parser;
use cli::{Cli, Commands};
use dispatchbox::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Logs go to stderr; stdout carries the response body
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Send(args) => send::run(args, config).await?,
    }

    Ok(())
}
