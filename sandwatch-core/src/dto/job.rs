//! Job DTOs for the backend's job endpoints

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobId, JobKind};

/// Request to create a job of a given kind (`POST /jobs`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub kind: JobKind,
}

/// Job descriptor returned by create and restart
///
/// Only the id is contractual; the rest of the body is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
}

/// Row of the analysis list (`GET /jobs`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub filename: String,
    pub status: String,
    pub upload_time: String,
    #[serde(default)]
    pub completion_time: Option<String>,
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(default)]
    pub analysis_type: Option<String>,
}

impl JobSummary {
    pub fn kind(&self) -> JobKind {
        match self.analysis_type.as_deref() {
            Some("interactive") | Some("interactive-session") => JobKind::InteractiveSession,
            _ => JobKind::StandardAnalysis,
        }
    }
}

/// Output of one analysis tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub returncode: i32,
}

/// Results document (`GET /jobs/{id}/results`)
///
/// A job that is not completed yet comes back with its status and a message
/// but without metadata or tool results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub analysis_id: JobId,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub tools_results: Option<std::collections::BTreeMap<String, ToolOutput>>,
}
