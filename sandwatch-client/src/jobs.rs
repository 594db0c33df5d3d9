//! Job-related API endpoints

use crate::BackendClient;
use crate::error::Result;
use sandwatch_core::domain::job::{JobId, JobKind};
use sandwatch_core::dto::job::{AnalysisResults, CreateJob, JobDescriptor, JobSummary};
use sandwatch_core::dto::status::StatusPayload;
use tracing::debug;

impl BackendClient {
    // =============================================================================
    // Status
    // =============================================================================

    /// Fetch the current status of a job
    ///
    /// Issues exactly one `GET /status/{id}`.
    ///
    /// # Arguments
    /// * `job_id` - The job identifier
    ///
    /// # Returns
    /// The raw status payload
    pub async fn fetch_status(&self, job_id: &JobId) -> Result<StatusPayload> {
        let url = self.endpoint(&["status", job_id.as_str()])?;
        debug!("Fetching status for job {}", job_id);
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Job Control
    // =============================================================================

    /// Create a new job of the given kind
    ///
    /// # Returns
    /// The descriptor of the created job
    pub async fn create_job(&self, kind: JobKind) -> Result<JobDescriptor> {
        let url = self.endpoint(&["jobs"])?;
        let response = self
            .client
            .post(url)
            .json(&CreateJob { kind })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Ask the backend to run a job again
    ///
    /// The backend answers `202 Accepted` with a descriptor whose id may
    /// differ from `job_id`.
    pub async fn restart_job(&self, job_id: &JobId) -> Result<JobDescriptor> {
        let url = self.endpoint(&["jobs", job_id.as_str(), "restart"])?;
        let response = self.client.post(url).send().await?;

        self.handle_response(response).await
    }

    /// End an interactive session (`204 No Content`)
    pub async fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        let url = self.endpoint(&["jobs", job_id.as_str(), "cancel"])?;
        let response = self.client.post(url).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Listings and Results
    // =============================================================================

    /// List all known analyses, most recent first
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let url = self.endpoint(&["jobs"])?;
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    /// Get the results document of an analysis
    ///
    /// An analysis that has not completed yet returns its status and a
    /// message instead of results.
    pub async fn fetch_results(&self, job_id: &JobId) -> Result<AnalysisResults> {
        let url = self.endpoint(&["jobs", job_id.as_str(), "results"])?;
        let response = self.client.get(url).send().await?;

        self.handle_response(response).await
    }

    /// Check that the backend is reachable and healthy
    pub async fn health(&self) -> Result<()> {
        let url = self.endpoint(&["health"])?;
        let response = self.client.get(url).send().await?;

        self.handle_empty_response(response).await
    }
}
