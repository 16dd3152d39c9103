//! memfab - tiered conversational memory CLI
//!
//! Records interactions into the memory fabric and prints the context it
//! assembles from the recency, archive and semantic tiers.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("memfab=info".parse()?)
                .add_directive("memfab_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = config::Config::load()?;
    if let Some(database) = cli.database {
        config.paths.database = database;
    }
    if let Some(index_dir) = cli.index_dir {
        config.fabric.index_dir = index_dir;
    }

    // Execute command
    match cli.command {
        Commands::Add(args) => commands::memory::add(args, &config).await,
        Commands::Context(args) => commands::memory::context(args, &config).await,
        Commands::Summarize { user_id } => commands::memory::summarize(&user_id, &config).await,
        Commands::Decay(args) => commands::maintain::decay(args, &config).await,
        Commands::Rebuild { user_id } => commands::maintain::rebuild(&user_id, &config).await,
        Commands::Stats { user_id, json } => commands::maintain::stats(&user_id, json, &config).await,
        Commands::Users => commands::maintain::users(&config).await,
        Commands::Config(cmd) => commands::config::execute(cmd, &config),
        Commands::Doctor => commands::doctor::execute(&config).await,
        Commands::Version => {
            println!("memfab {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
