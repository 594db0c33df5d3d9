//! Interactive session command handlers

use anyhow::{Context, Result, bail};
use colored::*;
use sandwatch_client::BackendClient;
use sandwatch_core::domain::job::JobKind;
use sandwatch_core::domain::session::ConnectionDescriptor;
use sandwatch_tracker::JobTracker;

use crate::id_resolver::resolve_job;
use crate::types::IdOrPrefix;

/// End an interactive session on the backend
pub async fn cancel_session(tracker: &JobTracker, client: &BackendClient, id: &str) -> Result<()> {
    let resolved = resolve_job(client, &IdOrPrefix::parse(id)?).await?;
    if resolved.kind == Some(JobKind::StandardAnalysis) {
        bail!(
            "Job {} is an analysis; only interactive sessions can be cancelled",
            resolved.id
        );
    }

    let job_id = tracker.track(resolved.id, JobKind::InteractiveSession);
    tracker
        .cancel(&job_id)
        .await
        .with_context(|| format!("Failed to cancel session {}", job_id))?;

    println!("{}", "✓ Session closed".green().bold());
    println!("  Session ID: {}", job_id.as_str().cyan());
    Ok(())
}

/// Print how to reach a ready session
pub(super) fn print_connection(connection: &ConnectionDescriptor) {
    println!("{}", "Session ready:".green().bold());
    println!("  Display: {}", connection.display_url().cyan());
    println!("  VNC:     {}", connection.direct_address().cyan());
}
