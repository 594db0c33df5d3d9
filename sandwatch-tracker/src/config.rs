//! Tracker configuration
//!
//! Defines the polling policy for each job kind and the backend connection
//! settings. One parameterized policy replaces per-view polling loops.

use std::collections::HashMap;
use std::time::Duration;

use sandwatch_core::domain::job::{JobKind, LifecycleState};

/// Lookup table from raw backend status to lifecycle state
///
/// Lookups are exact; a status missing from the table is a protocol error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMap {
    entries: HashMap<String, LifecycleState>,
}

impl StatusMap {
    /// Default table for a job kind
    ///
    /// Interactive sessions report `running` once the display is reachable
    /// and `completed` once the session has ended.
    pub fn for_kind(kind: JobKind) -> Self {
        let entries: &[(&str, LifecycleState)] = match kind {
            JobKind::StandardAnalysis => &[
                ("pending", LifecycleState::Pending),
                ("running", LifecycleState::Running),
                ("completed", LifecycleState::Completed),
                ("failed", LifecycleState::Failed),
                ("error", LifecycleState::Failed),
            ],
            JobKind::InteractiveSession => &[
                ("pending", LifecycleState::Pending),
                ("starting", LifecycleState::Starting),
                ("running", LifecycleState::Ready),
                ("completed", LifecycleState::Closed),
                ("failed", LifecycleState::Failed),
                ("error", LifecycleState::Failed),
            ],
        };

        Self {
            entries: entries
                .iter()
                .map(|(raw, state)| (raw.to_string(), *state))
                .collect(),
        }
    }

    /// Adds or replaces a mapping
    pub fn with_entry(mut self, raw: impl Into<String>, state: LifecycleState) -> Self {
        self.entries.insert(raw.into(), state);
        self
    }

    pub fn lookup(&self, raw: &str) -> Option<LifecycleState> {
        self.entries.get(raw).copied()
    }
}

/// Polling behavior for one job kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between the end of one status fetch and the start of the next
    pub interval: Duration,

    /// Consecutive transient failures tolerated before the job fails
    pub retry_limit: u32,

    /// Raw status interpretation
    pub status_map: StatusMap,
}

impl PollPolicy {
    /// Default policy: 5s for analyses, 2s for interactive readiness, 3 retries
    pub fn for_kind(kind: JobKind) -> Self {
        let interval = match kind {
            JobKind::StandardAnalysis => Duration::from_millis(5000),
            JobKind::InteractiveSession => Duration::from_millis(2000),
        };

        Self {
            interval,
            retry_limit: 3,
            status_map: StatusMap::for_kind(kind),
        }
    }
}

/// Tracker configuration
///
/// All intervals are configurable to allow tuning for different
/// deployments (local backend vs slow remote sandbox hosts).
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Backend base URL (e.g., "http://localhost:8000")
    pub backend_url: String,

    /// Per-request timeout; a timed-out fetch counts as a network failure
    pub request_timeout: Duration,

    /// Policy for standard analyses
    pub analysis: PollPolicy,

    /// Policy for interactive sessions
    pub interactive: PollPolicy,
}

impl TrackerConfig {
    /// Creates a new configuration with defaults
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            request_timeout: Duration::from_secs(10),
            analysis: PollPolicy::for_kind(JobKind::StandardAnalysis),
            interactive: PollPolicy::for_kind(JobKind::InteractiveSession),
        }
    }

    /// Applies overrides from environment variables
    ///
    /// Recognised environment variables (unset or unparsable ones are ignored):
    /// - SANDWATCH_ANALYSIS_POLL_MS (milliseconds, default: 5000)
    /// - SANDWATCH_INTERACTIVE_POLL_MS (milliseconds, default: 2000)
    /// - SANDWATCH_RETRY_LIMIT (applies to both kinds, default: 3)
    /// - SANDWATCH_REQUEST_TIMEOUT_SECS (seconds, default: 10)
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(interval) = env_millis("SANDWATCH_ANALYSIS_POLL_MS") {
            self.analysis.interval = interval;
        }

        if let Some(interval) = env_millis("SANDWATCH_INTERACTIVE_POLL_MS") {
            self.interactive.interval = interval;
        }

        if let Some(limit) = std::env::var("SANDWATCH_RETRY_LIMIT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            self = self.with_retry_limit(limit);
        }

        if let Some(timeout) = std::env::var("SANDWATCH_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
        {
            self.request_timeout = timeout;
        }

        self
    }

    /// Sets the retry limit of both policies
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.analysis.retry_limit = retry_limit;
        self.interactive.retry_limit = retry_limit;
        self
    }

    /// Policy for a job kind
    pub fn policy(&self, kind: JobKind) -> &PollPolicy {
        match kind {
            JobKind::StandardAnalysis => &self.analysis,
            JobKind::InteractiveSession => &self.interactive,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend_url.is_empty() {
            anyhow::bail!("backend_url cannot be empty");
        }

        if !self.backend_url.starts_with("http://") && !self.backend_url.starts_with("https://") {
            anyhow::bail!("backend_url must start with http:// or https://");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.analysis.interval.is_zero() {
            anyhow::bail!("analysis poll interval must be greater than 0");
        }

        if self.interactive.interval.is_zero() {
            anyhow::bail!("interactive poll interval must be greater than 0");
        }

        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new("http://localhost:8000")
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}
