//! Job domain types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::error::JobError;
use crate::dto::status::StatusPayload;

/// Opaque job identifier assigned by the backend
///
/// Never empty. The backend hands out UUID strings today, but nothing here
/// relies on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

/// Returned when an empty job identifier is supplied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job id cannot be empty")]
pub struct InvalidJobId;

impl JobId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidJobId> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(InvalidJobId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = InvalidJobId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl FromStr for JobId {
    type Err = InvalidJobId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// What a job does, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    StandardAnalysis,
    InteractiveSession,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::StandardAnalysis => "standard-analysis",
            JobKind::InteractiveSession => "interactive-session",
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, JobKind::InteractiveSession)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpreted, UI-relevant state of a job
///
/// Standard analyses move `Pending -> Running -> Completed | Failed`.
/// Interactive sessions move `Pending -> Starting -> Ready -> Closed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Pending,
    Running,
    Starting,
    Ready,
    Completed,
    Failed,
    Closed,
}

impl LifecycleState {
    /// No transition leaves a terminal state; only a restart creates a new job record.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Completed | LifecycleState::Failed | LifecycleState::Closed
        )
    }

    /// Position along the lifecycle path, used to detect stale (backward) reports
    pub fn rank(&self) -> u8 {
        match self {
            LifecycleState::Pending => 0,
            LifecycleState::Running | LifecycleState::Starting => 1,
            LifecycleState::Ready => 2,
            LifecycleState::Completed | LifecycleState::Failed | LifecycleState::Closed => 3,
        }
    }

    /// Whether the transition graph of `kind` has an edge `self -> next`
    pub fn can_transition_to(&self, kind: JobKind, next: LifecycleState) -> bool {
        use LifecycleState::*;

        match kind {
            JobKind::StandardAnalysis => matches!(
                (self, next),
                (Pending, Running) | (Pending, Completed) | (Pending, Failed)
                    | (Running, Completed)
                    | (Running, Failed)
            ),
            JobKind::InteractiveSession => matches!(
                (self, next),
                (Pending, Starting) | (Pending, Failed) | (Pending, Closed)
                    | (Starting, Ready)
                    | (Starting, Failed)
                    | (Starting, Closed)
                    | (Ready, Closed)
                    | (Ready, Failed)
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Running => "running",
            LifecycleState::Starting => "starting",
            LifecycleState::Ready => "ready",
            LifecycleState::Completed => "completed",
            LifecycleState::Failed => "failed",
            LifecycleState::Closed => "closed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracking record for one submitted job
///
/// `record_id` identifies this record rather than the backend job; restarting
/// a job produces a new record even when the backend keeps the same `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub record_id: Uuid,
    pub kind: JobKind,
    pub raw_status: Option<String>,
    pub last_payload: Option<StatusPayload>,
    pub lifecycle_state: LifecycleState,
    pub attempts: u32,
    pub last_error: Option<JobError>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Job {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            record_id: Uuid::new_v4(),
            kind,
            raw_status: None,
            last_payload: None,
            lifecycle_state: LifecycleState::Pending,
            attempts: 0,
            last_error: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.lifecycle_state.is_terminal()
    }
}
