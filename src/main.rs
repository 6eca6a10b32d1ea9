mod auth;
mod cli;
mod config;
mod error;
mod models;
mod output;
mod providers;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    info!("Starting CIMinutes - GitLab CI usage report");
    cli.execute().await?;

    Ok(())
}
