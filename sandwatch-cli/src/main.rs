//! Sandwatch CLI
//!
//! Terminal dashboard for the sandbox analysis backend: starts jobs, follows
//! their lifecycle and shows results.

mod commands;
mod config;
mod id_resolver;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sandwatch")]
#[command(about = "Sandbox analysis job tracker", long_about = None)]
struct Cli {
    /// Analysis backend URL
    #[arg(
        long,
        env = "SANDWATCH_BACKEND_URL",
        default_value = "http://localhost:8000"
    )]
    backend_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never mix with command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sandwatch=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        backend_url: cli.backend_url,
    };

    handle_command(cli.command, &config).await
}
