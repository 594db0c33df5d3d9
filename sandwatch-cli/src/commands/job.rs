//! Job command handlers
//!
//! Handles job lifecycle commands (start, watch, restart) and the analysis
//! list, results and health views.

use anyhow::{Context, Result, bail};
use colored::*;
use sandwatch_client::BackendClient;
use sandwatch_core::domain::job::{JobId, JobKind, LifecycleState};
use sandwatch_core::domain::snapshot::JobSnapshot;
use sandwatch_core::dto::job::{AnalysisResults, JobSummary};
use sandwatch_tracker::{JobTracker, StatusMap};

use super::session::print_connection;
use crate::id_resolver::{ResolvedJob, resolve_job};
use crate::types::{IdOrPrefix, KindArg};

/// Create a job and optionally follow it
pub async fn start_job(
    tracker: &JobTracker,
    client: &BackendClient,
    kind: JobKind,
    watch: bool,
) -> Result<()> {
    let job_id = tracker.start(kind).await.context("Failed to create job")?;

    println!("{}", "✓ Job created successfully!".green().bold());
    println!("  Job ID: {}", job_id.as_str().cyan());
    println!("  Kind:   {}", kind);

    if watch {
        println!();
        follow_job(tracker, client, &job_id, false).await?;
    }
    Ok(())
}

/// Follow an existing job
pub async fn watch_job(
    tracker: &JobTracker,
    client: &BackendClient,
    id: &str,
    kind: Option<KindArg>,
    results: bool,
) -> Result<()> {
    let resolved = resolve_job(client, &IdOrPrefix::parse(id)?).await?;
    let kind = job_kind(&resolved, kind);

    let job_id = tracker.track(resolved.id, kind);
    follow_job(tracker, client, &job_id, results).await
}

/// Restart a job and optionally follow the new record
pub async fn restart_job(
    tracker: &JobTracker,
    client: &BackendClient,
    id: &str,
    kind: Option<KindArg>,
    watch: bool,
) -> Result<()> {
    let resolved = resolve_job(client, &IdOrPrefix::parse(id)?).await?;
    let kind = job_kind(&resolved, kind);

    let previous = tracker.track(resolved.id, kind);
    let job_id = tracker
        .restart(&previous)
        .await
        .with_context(|| format!("Failed to restart job {}", previous))?;

    println!("{}", "✓ Job restarted".green().bold());
    println!("  Job ID:   {}", job_id.as_str().cyan());
    if job_id != previous {
        println!("  Previous: {}", previous.as_str().dimmed());
    }

    if watch {
        println!();
        follow_job(tracker, client, &job_id, false).await?;
    }
    Ok(())
}

/// List all analyses
pub async fn list_jobs(client: &BackendClient) -> Result<()> {
    let jobs = client.list_jobs().await.context("Failed to list jobs")?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

/// Get and display the results of an analysis
pub async fn show_results(client: &BackendClient, id: &str) -> Result<()> {
    let resolved = resolve_job(client, &IdOrPrefix::parse(id)?).await?;
    fetch_and_print_results(client, &resolved.id).await
}

pub async fn check_health(client: &BackendClient) -> Result<()> {
    client
        .health()
        .await
        .with_context(|| format!("Backend at {} is not healthy", client.base_url()))?;

    println!("{} Backend reachable at {}", "✓".green(), client.base_url().cyan());
    Ok(())
}

/// Explicit flag first, then the kind the backend listed, then analysis
fn job_kind(resolved: &ResolvedJob, flag: Option<KindArg>) -> JobKind {
    flag.map(JobKind::from)
        .or(resolved.kind)
        .unwrap_or(JobKind::StandardAnalysis)
}

/// Print snapshots until the job is terminal
///
/// A failed job makes the command fail.
async fn follow_job(
    tracker: &JobTracker,
    client: &BackendClient,
    job_id: &JobId,
    results: bool,
) -> Result<()> {
    let mut subscription = tracker.observe(job_id)?;
    println!("{}", format!("Watching {} (Ctrl-C to stop)", job_id).bold());

    let mut last_state = None;
    let mut last_attempts = 0;
    let mut last_snapshot = None;

    loop {
        let next = tokio::select! {
            snapshot = subscription.next() => snapshot,
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Stopped watching.".dimmed());
                return Ok(());
            }
        };
        let Some(snapshot) = next else {
            break;
        };

        if last_state != Some(snapshot.state) {
            print_state(&snapshot);
            if let Some(connection) = &snapshot.connection {
                print_connection(connection);
            }
            last_state = Some(snapshot.state);
        } else if snapshot.attempts > last_attempts {
            println!(
                "  {} backend unreachable, retrying ({} failed attempt(s))",
                "⚠".yellow(),
                snapshot.attempts
            );
        }
        last_attempts = snapshot.attempts;
        last_snapshot = Some(snapshot);
    }

    let Some(snapshot) = last_snapshot.filter(JobSnapshot::is_terminal) else {
        bail!("Tracking of job {} ended before it finished", job_id);
    };

    match snapshot.state {
        LifecycleState::Failed => {
            let message = snapshot
                .error
                .map(|err| err.message)
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("Job {} failed: {}", job_id, message)
        }
        LifecycleState::Completed if results => {
            println!();
            fetch_and_print_results(client, job_id).await
        }
        _ => Ok(()),
    }
}

async fn fetch_and_print_results(client: &BackendClient, job_id: &JobId) -> Result<()> {
    let results = client
        .fetch_results(job_id)
        .await
        .with_context(|| format!("Failed to fetch results for job {}", job_id))?;

    print_results(&results);
    Ok(())
}

fn print_state(snapshot: &JobSnapshot) {
    println!(
        "{} {} {}",
        snapshot.observed_at.format("%H:%M:%S").to_string().dimmed(),
        "▸".cyan(),
        colorize_state(snapshot.state, snapshot.state.as_str())
    );

    if let Some(error) = &snapshot.error {
        match snapshot.state {
            LifecycleState::Failed => println!("  {}", error.message.red()),
            _ => println!("  {}", error.message.dimmed()),
        }
    }
}

/// Print a job summary from the analysis list
fn print_job_summary(job: &JobSummary) {
    let kind = job.kind();
    let status = match StatusMap::for_kind(kind).lookup(&job.status) {
        Some(state) => colorize_state(state, &job.status),
        None => job.status.dimmed(),
    };

    println!("  {} {}", "▸".cyan(), job.filename.bold());
    println!("    ID:       {}", job.id.as_str().dimmed());
    println!("    Kind:     {}", kind);
    println!("    Status:   {}", status);
    println!("    Uploaded: {}", job.upload_time.dimmed());
    if let Some(completed) = &job.completion_time {
        println!("    Finished: {}", completed.dimmed());
    }
    if let Some(hash) = &job.file_hash {
        println!("    SHA-256:  {}", hash.dimmed());
    }
    println!();
}

/// Print analysis results with per-tool output
fn print_results(results: &AnalysisResults) {
    println!("{}", "Analysis Results:".bold());
    println!("  ID:     {}", results.analysis_id.as_str().cyan());
    println!("  Status: {}", results.status);

    if let Some(message) = &results.message {
        println!("  {}", message.yellow());
    }

    if let Some(metadata) = &results.metadata {
        println!("\n{}", "Metadata:".bold());
        if let Ok(pretty) = serde_json::to_string_pretty(metadata) {
            println!("{}", pretty);
        } else {
            println!("{:?}", metadata);
        }
    }

    let Some(tools) = &results.tools_results else {
        return;
    };
    for (name, output) in tools {
        let code = output.returncode.to_string();
        println!("\n{} {}", "Tool:".bold(), name.cyan());
        println!(
            "  Exit Code: {}",
            if output.returncode == 0 {
                code.green()
            } else {
                code.red()
            }
        );
        println!("{}", "─".repeat(80).dimmed());
        if !output.stdout.is_empty() {
            println!("{}", output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            println!("{}", output.stderr.trim_end().red());
        }
        println!("{}", "─".repeat(80).dimmed());
    }
}

/// Colorize a lifecycle state for display
fn colorize_state(state: LifecycleState, text: &str) -> ColoredString {
    match state {
        LifecycleState::Pending => text.yellow(),
        LifecycleState::Running | LifecycleState::Starting => text.cyan(),
        LifecycleState::Ready => text.green().bold(),
        LifecycleState::Completed => text.green(),
        LifecycleState::Failed => text.red(),
        LifecycleState::Closed => text.dimmed(),
    }
}
