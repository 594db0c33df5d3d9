//! Session connector
//!
//! Turns the payload of a `ready` interactive session into a
//! [`ConnectionDescriptor`]. The descriptor is built from the status fetch
//! that reported readiness, so resolving never issues a request of its own.

use std::collections::HashMap;

use sandwatch_core::domain::job::{Job, JobId, LifecycleState};
use sandwatch_core::domain::session::ConnectionDescriptor;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Why a connection descriptor could not be produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    /// Resolution was attempted outside the `ready` state
    #[error("session {job_id} is {state}, not ready")]
    NotReady {
        job_id: JobId,
        state: LifecycleState,
    },

    /// Backend reported ready without complete connection info
    #[error("session {job_id} reported ready without {missing}")]
    UpstreamUnavailable { job_id: JobId, missing: String },
}

/// Resolves and caches connection descriptors
///
/// Entries are keyed by job id and remember the record they were built
/// for, so a restarted job never sees its predecessor's descriptor.
#[derive(Debug, Default)]
pub struct SessionConnector {
    cache: HashMap<JobId, (Uuid, ConnectionDescriptor)>,
}

impl SessionConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the descriptor of a ready session
    ///
    /// Repeated calls for the same ready job return the cached descriptor.
    pub fn resolve(&mut self, job: &Job) -> Result<ConnectionDescriptor, ConnectorError> {
        if job.lifecycle_state != LifecycleState::Ready {
            return Err(ConnectorError::NotReady {
                job_id: job.id.clone(),
                state: job.lifecycle_state,
            });
        }

        if let Some(descriptor) = self.cached(job) {
            return Ok(descriptor.clone());
        }

        let Some(payload) = job.last_payload.as_ref() else {
            return Err(ConnectorError::UpstreamUnavailable {
                job_id: job.id.clone(),
                missing: "a status payload".to_string(),
            });
        };

        let missing = payload.missing_connection_fields();
        let (Some(host), Some(display_port), Some(direct_port), Some(auth_token)) = (
            payload.host.clone(),
            payload.display_port,
            payload.direct_port,
            payload.auth_token.clone(),
        ) else {
            return Err(ConnectorError::UpstreamUnavailable {
                job_id: job.id.clone(),
                missing: missing.join(", "),
            });
        };
        if !missing.is_empty() {
            // present but empty host or token
            return Err(ConnectorError::UpstreamUnavailable {
                job_id: job.id.clone(),
                missing: missing.join(", "),
            });
        }

        let descriptor = ConnectionDescriptor {
            host,
            display_port,
            direct_port,
            auth_token,
        };
        debug!(
            "Resolved connection for session {}: {}",
            job.id,
            descriptor.direct_address()
        );

        self.cache
            .insert(job.id.clone(), (job.record_id, descriptor.clone()));
        Ok(descriptor)
    }

    /// Cached descriptor for this exact job record
    pub fn cached(&self, job: &Job) -> Option<&ConnectionDescriptor> {
        self.cache
            .get(&job.id)
            .filter(|(record_id, _)| *record_id == job.record_id)
            .map(|(_, descriptor)| descriptor)
    }

    /// Drops the cached descriptor; called when a job leaves `ready`
    pub fn invalidate(&mut self, job_id: &JobId) {
        if self.cache.remove(job_id).is_some() {
            debug!("Invalidated connection for session {}", job_id);
        }
    }
}
