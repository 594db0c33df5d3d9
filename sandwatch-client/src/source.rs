//! Backend seams used by the lifecycle tracker
//!
//! The tracker only depends on these traits, so tests can drive it with
//! scripted fakes instead of a live backend.

use async_trait::async_trait;
use sandwatch_core::domain::job::{JobId, JobKind};
use sandwatch_core::dto::job::JobDescriptor;
use sandwatch_core::dto::status::StatusPayload;

use crate::BackendClient;
use crate::error::Result;

/// Source of job status reports
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Performs a single status fetch
    ///
    /// Exactly one outbound request per call; no caching and no retry.
    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusPayload>;
}

/// Backend operations that change a job
#[async_trait]
pub trait JobControl: Send + Sync {
    /// Creates a job of `kind` and returns its backend id
    async fn create_job(&self, kind: JobKind) -> Result<JobDescriptor>;

    /// Runs a job again; the returned id may differ from `job_id`
    async fn restart_job(&self, job_id: &JobId) -> Result<JobDescriptor>;

    /// Ends an interactive session
    async fn cancel_job(&self, job_id: &JobId) -> Result<()>;
}

#[async_trait]
impl StatusSource for BackendClient {
    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusPayload> {
        BackendClient::fetch_status(self, job_id).await
    }
}

#[async_trait]
impl JobControl for BackendClient {
    async fn create_job(&self, kind: JobKind) -> Result<JobDescriptor> {
        BackendClient::create_job(self, kind).await
    }

    async fn restart_job(&self, job_id: &JobId) -> Result<JobDescriptor> {
        BackendClient::restart_job(self, job_id).await
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        BackendClient::cancel_job(self, job_id).await
    }
}
