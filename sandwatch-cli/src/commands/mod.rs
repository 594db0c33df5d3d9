//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod session;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use sandwatch_client::BackendClient;
use sandwatch_tracker::{JobTracker, TrackerConfig};

use crate::config::Config;
use crate::types::KindArg;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create a job on the backend
    Start {
        /// Kind of job to create
        #[arg(value_enum)]
        kind: KindArg,

        /// Follow the job until it finishes
        #[arg(short, long)]
        watch: bool,
    },
    /// Follow a job until it reaches a terminal state
    Watch {
        /// Job ID or unambiguous prefix
        id: String,

        /// Job kind, when the backend listing does not tell
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        /// Print the analysis results once completed
        #[arg(long)]
        results: bool,
    },
    /// Run a job again
    Restart {
        /// Job ID or unambiguous prefix
        id: String,

        /// Job kind, when the backend listing does not tell
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        /// Follow the restarted job
        #[arg(short, long)]
        watch: bool,
    },
    /// End an interactive session
    Cancel {
        /// Session ID or unambiguous prefix
        id: String,
    },
    /// List analyses known to the backend
    List,
    /// Show the results of an analysis
    Results {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Check that the backend is reachable
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let tracker_config = config.tracker_config()?;
    let client = Arc::new(
        BackendClient::with_timeout(&tracker_config.backend_url, tracker_config.request_timeout)
            .context("Failed to create backend client")?,
    );

    match command {
        Commands::Start { kind, watch } => {
            let tracker = tracker(tracker_config, &client);
            job::start_job(&tracker, &client, kind.into(), watch).await
        }
        Commands::Watch { id, kind, results } => {
            let tracker = tracker(tracker_config, &client);
            job::watch_job(&tracker, &client, &id, kind, results).await
        }
        Commands::Restart { id, kind, watch } => {
            let tracker = tracker(tracker_config, &client);
            job::restart_job(&tracker, &client, &id, kind, watch).await
        }
        Commands::Cancel { id } => {
            let tracker = tracker(tracker_config, &client);
            session::cancel_session(&tracker, &client, &id).await
        }
        Commands::List => job::list_jobs(&client).await,
        Commands::Results { id } => job::show_results(&client, &id).await,
        Commands::Health => job::check_health(&client).await,
    }
}

fn tracker(config: TrackerConfig, client: &Arc<BackendClient>) -> JobTracker {
    JobTracker::new(config, client.clone(), client.clone())
}
