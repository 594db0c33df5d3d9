//! Job lifecycle state machine
//!
//! The single place where fetch results and errors become lifecycle
//! transitions. Every change is published to a watch channel that
//! dashboards observe.

use sandwatch_client::FetchError;
use sandwatch_core::domain::error::JobError;
use sandwatch_core::domain::job::{Job, JobKind, LifecycleState};
use sandwatch_core::domain::session::ConnectionDescriptor;
use sandwatch_core::domain::snapshot::JobSnapshot;
use sandwatch_core::dto::status::StatusPayload;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::PollPolicy;
use crate::connector::SessionConnector;
use crate::scheduler::PollControl;

/// What should happen after a result was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Keep polling
    Continue,
    /// The session is reachable; polling continues to notice when it ends
    EnterInteractive(ConnectionDescriptor),
    /// Terminal success or closed session
    Stop,
    /// Terminal failure
    Fail(JobError),
}

impl NextAction {
    pub fn poll_control(&self) -> PollControl {
        match self {
            NextAction::Continue | NextAction::EnterInteractive(_) => PollControl::Continue,
            NextAction::Stop | NextAction::Fail(_) => PollControl::Stop,
        }
    }
}

/// Lifecycle state machine for one job record
pub struct LifecycleMachine {
    job: Job,
    policy: PollPolicy,
    connector: SessionConnector,
    updates: watch::Sender<JobSnapshot>,
}

impl LifecycleMachine {
    /// Creates a machine for a fresh job record and the receiver observing it
    pub fn new(job: Job, policy: PollPolicy) -> (Self, watch::Receiver<JobSnapshot>) {
        let (updates, receiver) = watch::channel(JobSnapshot::from_job(&job, None));
        let machine = Self {
            job,
            policy,
            connector: SessionConnector::new(),
            updates,
        };
        (machine, receiver)
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn state(&self) -> LifecycleState {
        self.job.lifecycle_state
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.updates.subscribe()
    }

    /// Descriptor of the session, defined only while `ready`
    pub fn connection_descriptor(&self) -> Option<ConnectionDescriptor> {
        if self.job.lifecycle_state != LifecycleState::Ready {
            return None;
        }
        self.connector.cached(&self.job).cloned()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot::from_job(&self.job, self.connection_descriptor())
    }

    /// Applies one status fetch result
    ///
    /// Results arriving after the job became terminal are ignored.
    pub fn apply(&mut self, result: Result<StatusPayload, FetchError>) -> NextAction {
        if self.job.is_terminal() {
            debug!(
                "Ignoring status result for job {} in terminal state {}",
                self.job.id, self.job.lifecycle_state
            );
            return NextAction::Stop;
        }

        match result {
            Ok(payload) => self.apply_payload(payload),
            Err(err) if err.is_retryable() => self.apply_transient(err),
            Err(err) => {
                warn!("Status fetch for job {} failed permanently: {}", self.job.id, err);
                self.fail(err.to_job_error())
            }
        }
    }

    /// Closes an interactive session on user request
    ///
    /// Returns `false` when the job is not an interactive session or is
    /// already terminal.
    pub fn close(&mut self, reason: impl Into<String>) -> bool {
        if !self.job.kind.is_interactive() || self.job.is_terminal() {
            return false;
        }

        self.leave_state(LifecycleState::Closed);
        self.job.last_error = Some(JobError::permanent(reason));
        info!("Session {} closed", self.job.id);
        self.publish();
        true
    }

    fn apply_transient(&mut self, err: FetchError) -> NextAction {
        self.job.attempts += 1;
        self.job.last_error = Some(err.to_job_error());

        if self.job.attempts <= self.policy.retry_limit {
            warn!(
                "Status fetch for job {} failed (attempt {}/{}): {}",
                self.job.id, self.job.attempts, self.policy.retry_limit, err
            );
            self.publish();
            return NextAction::Continue;
        }

        let attempts = self.job.attempts;
        self.fail(JobError::transient(format!(
            "Backend unreachable after {} attempts: {}",
            attempts, err
        )))
    }

    fn apply_payload(&mut self, payload: StatusPayload) -> NextAction {
        self.job.attempts = 0;
        self.job.last_error = None;
        self.job.raw_status = Some(payload.status.clone());

        let raw = payload.status.clone();
        let message = payload.message.clone();
        self.job.last_payload = Some(payload);

        let Some(next) = self.policy.status_map.lookup(&raw) else {
            return self.fail(JobError::protocol(format!(
                "Unknown status '{}' reported for job {}",
                raw, self.job.id
            )));
        };

        let current = self.job.lifecycle_state;
        if next == current || next.rank() < current.rank() {
            if next != current {
                debug!(
                    "Ignoring stale status '{}' for job {} in state {}",
                    raw, self.job.id, current
                );
            }
            self.publish();
            return NextAction::Continue;
        }

        if !current.can_transition_to(self.job.kind, next) {
            return self.fail(JobError::protocol(format!(
                "Status '{}' cannot move {} job {} from {} to {}",
                raw, self.job.kind, self.job.id, current, next
            )));
        }

        match next {
            LifecycleState::Ready => self.enter_ready(),
            LifecycleState::Failed => {
                let message = message.unwrap_or_else(|| default_failure_message(self.job.kind));
                self.fail(JobError::permanent(message))
            }
            LifecycleState::Closed => {
                self.leave_state(next);
                self.job.last_error = Some(JobError::permanent(
                    message.unwrap_or_else(|| "Session ended".to_string()),
                ));
                info!("Session {} ended", self.job.id);
                self.publish();
                NextAction::Stop
            }
            LifecycleState::Completed => {
                self.leave_state(next);
                info!("Job {} completed", self.job.id);
                self.publish();
                NextAction::Stop
            }
            LifecycleState::Pending | LifecycleState::Running | LifecycleState::Starting => {
                self.leave_state(next);
                info!("Job {} is {}", self.job.id, next);
                self.publish();
                NextAction::Continue
            }
        }
    }

    fn enter_ready(&mut self) -> NextAction {
        self.leave_state(LifecycleState::Ready);

        match self.connector.resolve(&self.job) {
            Ok(descriptor) => {
                info!(
                    "Session {} ready at {}",
                    self.job.id,
                    descriptor.direct_address()
                );
                self.publish();
                NextAction::EnterInteractive(descriptor)
            }
            Err(err) => self.fail(JobError::connector(err.to_string())),
        }
    }

    fn fail(&mut self, error: JobError) -> NextAction {
        self.leave_state(LifecycleState::Failed);
        warn!("Job {} failed: {}", self.job.id, error);
        self.job.last_error = Some(error.clone());
        self.publish();
        NextAction::Fail(error)
    }

    /// Moves to `next`, dropping the session descriptor when leaving `ready`
    fn leave_state(&mut self, next: LifecycleState) {
        if self.job.lifecycle_state == LifecycleState::Ready && next != LifecycleState::Ready {
            self.connector.invalidate(&self.job.id);
        }
        self.job.lifecycle_state = next;
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }
}

fn default_failure_message(kind: JobKind) -> String {
    match kind {
        JobKind::StandardAnalysis => "Analysis failed".to_string(),
        JobKind::InteractiveSession => "Interactive session failed to start".to_string(),
    }
}
