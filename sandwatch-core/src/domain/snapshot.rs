//! Observable job snapshots

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::JobError;
use crate::domain::job::{Job, JobId, JobKind, LifecycleState};
use crate::domain::session::ConnectionDescriptor;

/// What a dashboard sees of a job at one point in time
///
/// Non-terminal snapshots carry progress only: `error` is populated once the
/// job is terminal, `connection` only while the session is `ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub record_id: Uuid,
    pub kind: JobKind,
    pub state: LifecycleState,
    pub attempts: u32,
    pub error: Option<JobError>,
    pub connection: Option<ConnectionDescriptor>,
    pub observed_at: chrono::DateTime<chrono::Utc>,
}

impl JobSnapshot {
    pub fn from_job(job: &Job, connection: Option<ConnectionDescriptor>) -> Self {
        let error = if job.is_terminal() {
            job.last_error.clone()
        } else {
            None
        };
        let connection = if job.lifecycle_state == LifecycleState::Ready {
            connection
        } else {
            None
        };

        Self {
            job_id: job.id.clone(),
            record_id: job.record_id,
            kind: job.kind,
            state: job.lifecycle_state,
            attempts: job.attempts,
            error,
            connection,
            observed_at: chrono::Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
