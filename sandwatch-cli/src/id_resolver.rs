//! ID resolver module
//!
//! Resolves job id prefixes against the backend's analysis list, so users
//! can type short, unambiguous prefixes instead of full ids. The listing
//! also tells which kind of job an id belongs to.

use anyhow::{Context, Result, anyhow};
use sandwatch_client::BackendClient;
use sandwatch_core::domain::job::{JobId, JobKind};
use sandwatch_core::dto::job::JobSummary;
use tracing::debug;

use crate::types::IdOrPrefix;

/// A resolved job id and, when the backend listed it, its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJob {
    pub id: JobId,
    pub kind: Option<JobKind>,
}

/// Resolve a job ID or prefix to a full job id
///
/// A full id is returned as is; the listing is only consulted for its kind,
/// and a failed listing is not an error then.
///
/// # Errors
/// Returns an error if:
/// - No job matches the prefix
/// - Multiple jobs match the prefix (ambiguous)
/// - API call fails while resolving a prefix
pub async fn resolve_job(client: &BackendClient, id_or_prefix: &IdOrPrefix) -> Result<ResolvedJob> {
    if let Some(id) = id_or_prefix.as_job_id() {
        let kind = match client.list_jobs().await {
            Ok(jobs) => jobs.iter().find(|job| job.id == *id).map(JobSummary::kind),
            Err(err) => {
                debug!("Could not list jobs to determine the kind of {}: {}", id, err);
                None
            }
        };
        return Ok(ResolvedJob {
            id: id.clone(),
            kind,
        });
    }

    let jobs = client
        .list_jobs()
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    let summary = match_prefix(&jobs, id_or_prefix.as_str())?;
    Ok(ResolvedJob {
        id: summary.id.clone(),
        kind: Some(summary.kind()),
    })
}

/// Find the single job whose id starts with `prefix`; an exact match wins
fn match_prefix<'a>(jobs: &'a [JobSummary], prefix: &str) -> Result<&'a JobSummary> {
    let prefix = prefix.to_lowercase();

    if let Some(exact) = jobs
        .iter()
        .find(|job| job.id.as_str().to_lowercase() == prefix)
    {
        return Ok(exact);
    }

    let matches: Vec<_> = jobs
        .iter()
        .filter(|job| job.id.as_str().to_lowercase().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        [only] => Ok(only),
        _ => {
            let ids: Vec<&str> = matches.iter().map(|job| job.id.as_str()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
