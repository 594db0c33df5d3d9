//! Job tracker
//!
//! Dashboard-facing entry point. Every tracked job id owns one lifecycle
//! machine and at most one active poll. Dashboards read it through
//! [`Subscription`]s; when the last one is dropped polling stops, and the
//! next `observe` resumes it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sandwatch_client::{BackendClient, FetchError, JobControl, StatusSource};
use sandwatch_core::domain::job::{Job, JobId, JobKind};
use sandwatch_core::domain::session::ConnectionDescriptor;
use sandwatch_core::domain::snapshot::JobSnapshot;
use sandwatch_core::dto::status::StatusPayload;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::lifecycle::{LifecycleMachine, NextAction};
use crate::scheduler::{PollControl, PollHandle, PollObserver, PollingScheduler};

/// Errors returned by tracker operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("job {0} is not tracked")]
    UnknownJob(JobId),

    #[error(transparent)]
    Backend(#[from] FetchError),
}

/// Tracks jobs and keeps their lifecycle current
pub struct JobTracker {
    config: TrackerConfig,
    scheduler: PollingScheduler,
    control: Arc<dyn JobControl>,
    jobs: Mutex<HashMap<JobId, TrackedJob>>,
}

struct TrackedJob {
    kind: JobKind,
    machine: Arc<Mutex<LifecycleMachine>>,
    slot: Arc<PollSlot>,
}

/// Poll handle of a job plus the number of live subscriptions
#[derive(Debug, Default)]
struct PollSlot {
    handle: Mutex<Option<PollHandle>>,
    observers: AtomicUsize,
}

impl PollSlot {
    fn is_active(&self) -> bool {
        lock(&self.handle)
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    fn cancel(&self) -> bool {
        lock(&self.handle)
            .as_ref()
            .is_some_and(|handle| handle.cancel())
    }
}

impl JobTracker {
    pub fn new(
        config: TrackerConfig,
        source: Arc<dyn StatusSource>,
        control: Arc<dyn JobControl>,
    ) -> Self {
        Self {
            config,
            scheduler: PollingScheduler::new(source),
            control,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a tracker talking to the configured backend
    pub fn from_config(config: TrackerConfig) -> Result<Self, TrackerError> {
        let client = Arc::new(BackendClient::with_timeout(
            &config.backend_url,
            config.request_timeout,
        )?);
        Ok(Self::new(config, client.clone(), client))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Creates a job on the backend and starts tracking it
    pub async fn start(&self, kind: JobKind) -> Result<JobId, TrackerError> {
        let descriptor = self.control.create_job(kind).await?;
        info!("Created {} job {}", kind, descriptor.id);
        Ok(self.track(descriptor.id, kind))
    }

    /// Starts tracking a backend job with a fresh record
    ///
    /// Tracking an id again replaces its record; the previous poll is
    /// cancelled before the new one starts. Must be called from within a
    /// tokio runtime.
    pub fn track(&self, job_id: JobId, kind: JobKind) -> JobId {
        let policy = self.config.policy(kind).clone();
        let (machine, _updates) = LifecycleMachine::new(Job::new(job_id.clone(), kind), policy);
        let tracked = TrackedJob {
            kind,
            machine: Arc::new(Mutex::new(machine)),
            slot: Arc::default(),
        };

        let mut jobs = lock(&self.jobs);
        if let Some(previous) = jobs.remove(&job_id) {
            previous.slot.cancel();
            debug!("Replacing tracked record of job {}", job_id);
        }

        self.ensure_polling(&job_id, &tracked);
        jobs.insert(job_id.clone(), tracked);
        info!("Tracking {} job {}", kind, job_id);
        job_id
    }

    /// Subscribes to the snapshots of a tracked job
    ///
    /// Resumes polling when the job is not terminal and nothing polls it.
    pub fn observe(&self, job_id: &JobId) -> Result<Subscription, TrackerError> {
        let jobs = lock(&self.jobs);
        let tracked = jobs
            .get(job_id)
            .ok_or_else(|| TrackerError::UnknownJob(job_id.clone()))?;

        let updates = lock(&tracked.machine).subscribe();
        tracked.slot.observers.fetch_add(1, Ordering::SeqCst);
        self.ensure_polling(job_id, tracked);

        Ok(Subscription {
            job_id: job_id.clone(),
            updates,
            slot: Arc::clone(&tracked.slot),
            started: false,
            finished: false,
        })
    }

    /// Runs a job again under a new record
    ///
    /// The backend may hand out a different id; the old id is then dropped
    /// from the tracker.
    pub async fn restart(&self, job_id: &JobId) -> Result<JobId, TrackerError> {
        let kind = {
            let jobs = lock(&self.jobs);
            let tracked = jobs
                .get(job_id)
                .ok_or_else(|| TrackerError::UnknownJob(job_id.clone()))?;
            tracked.slot.cancel();
            tracked.kind
        };

        let descriptor = self.control.restart_job(job_id).await?;
        if descriptor.id != *job_id {
            if let Some(previous) = lock(&self.jobs).remove(job_id) {
                previous.slot.cancel();
            }
        }

        info!("Job {} restarted as {}", job_id, descriptor.id);
        Ok(self.track(descriptor.id, kind))
    }

    /// Stops polling a job
    ///
    /// Interactive sessions are also ended on the backend and move to
    /// `closed`. A session the backend no longer knows is closed all the same.
    pub async fn cancel(&self, job_id: &JobId) -> Result<(), TrackerError> {
        let (kind, machine) = {
            let jobs = lock(&self.jobs);
            let tracked = jobs
                .get(job_id)
                .ok_or_else(|| TrackerError::UnknownJob(job_id.clone()))?;
            if tracked.slot.cancel() {
                debug!("Cancelled polling of job {}", job_id);
            }
            (tracked.kind, Arc::clone(&tracked.machine))
        };

        if !kind.is_interactive() {
            info!("Stopped tracking analysis {}", job_id);
            return Ok(());
        }

        match self.control.cancel_job(job_id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                warn!("Session {} was already gone on the backend", job_id);
            }
            Err(err) => return Err(err.into()),
        }

        lock(&machine).close("Session closed by user");
        Ok(())
    }

    /// Descriptor of a tracked session, defined only while it is `ready`
    pub fn connection_descriptor(&self, job_id: &JobId) -> Option<ConnectionDescriptor> {
        let jobs = lock(&self.jobs);
        let tracked = jobs.get(job_id)?;
        lock(&tracked.machine).connection_descriptor()
    }

    pub fn snapshot(&self, job_id: &JobId) -> Option<JobSnapshot> {
        let jobs = lock(&self.jobs);
        let tracked = jobs.get(job_id)?;
        Some(lock(&tracked.machine).snapshot())
    }

    /// Whether a poll is currently active for the job
    pub fn is_polling(&self, job_id: &JobId) -> bool {
        lock(&self.jobs)
            .get(job_id)
            .is_some_and(|tracked| tracked.slot.is_active())
    }

    /// Starts a poll unless one is active or the job is terminal
    fn ensure_polling(&self, job_id: &JobId, tracked: &TrackedJob) {
        let mut handle = lock(&tracked.slot.handle);
        if handle.as_ref().is_some_and(|h| !h.is_cancelled()) {
            return;
        }

        let interval = {
            let machine = lock(&tracked.machine);
            if machine.job().is_terminal() {
                return;
            }
            machine.policy().interval
        };

        let driver = JobDriver {
            machine: Arc::clone(&tracked.machine),
        };
        *handle = Some(self.scheduler.start(job_id.clone(), interval, driver));
    }
}

/// Feeds poll results of one record into its machine
struct JobDriver {
    machine: Arc<Mutex<LifecycleMachine>>,
}

impl PollObserver for JobDriver {
    fn on_result(
        &mut self,
        handle: &PollHandle,
        result: Result<StatusPayload, FetchError>,
    ) -> PollControl {
        let mut machine = lock(&self.machine);

        // cancel may have landed while we waited for the lock
        if handle.is_cancelled() {
            debug!("Discarding status result for job {}", handle.job_id());
            return PollControl::Stop;
        }

        let action = machine.apply(result);
        if let NextAction::EnterInteractive(descriptor) = &action {
            debug!(
                "Session {} display at {}",
                handle.job_id(),
                descriptor.display_url()
            );
        }
        action.poll_control()
    }
}

/// Stream of snapshots for one tracked record
///
/// The first [`next`](Subscription::next) yields the current snapshot, each
/// later call the next change. After a terminal snapshot, or once the record
/// was replaced and its machine dropped, it yields `None`.
pub struct Subscription {
    job_id: JobId,
    updates: watch::Receiver<JobSnapshot>,
    slot: Arc<PollSlot>,
    started: bool,
    finished: bool,
}

impl Subscription {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub async fn next(&mut self) -> Option<JobSnapshot> {
        if self.finished {
            return None;
        }

        if self.started && self.updates.changed().await.is_err() {
            self.finished = true;
            return None;
        }
        self.started = true;

        let snapshot = self.updates.borrow_and_update().clone();
        if snapshot.is_terminal() {
            self.finished = true;
        }
        Some(snapshot)
    }

    /// Latest snapshot without waiting
    pub fn current(&self) -> JobSnapshot {
        self.updates.borrow().clone()
    }
}

impl Clone for Subscription {
    fn clone(&self) -> Self {
        self.slot.observers.fetch_add(1, Ordering::SeqCst);
        Self {
            job_id: self.job_id.clone(),
            updates: self.updates.clone(),
            slot: Arc::clone(&self.slot),
            started: self.started,
            finished: self.finished,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.slot.observers.fetch_sub(1, Ordering::SeqCst) == 1 && self.slot.cancel() {
            debug!("Last observer of job {} left, polling stopped", self.job_id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeControl, ScriptedSource, ready_payload};
    use sandwatch_core::domain::error::ErrorClass;
    use sandwatch_core::domain::job::LifecycleState;
    use tokio::sync::Notify;
    use tokio::time::{self, Duration};

    fn job_id(id: &str) -> JobId {
        JobId::new(id).unwrap()
    }

    fn tracker(source: Arc<ScriptedSource>, control: Arc<FakeControl>) -> JobTracker {
        JobTracker::new(TrackerConfig::default(), source, control)
    }

    async fn collect(mut subscription: Subscription) -> Vec<JobSnapshot> {
        let mut snapshots = Vec::new();
        while let Some(snapshot) = subscription.next().await {
            snapshots.push(snapshot);
        }
        snapshots
    }

    #[tokio::test(start_paused = true)]
    async fn test_standard_analysis_scenario() {
        let source = Arc::new(ScriptedSource::statuses(&["running", "running", "completed"]));
        let tracker = tracker(source.clone(), Arc::new(FakeControl::default()));

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        let snapshots = collect(tracker.observe(&id).unwrap()).await;

        let mut states: Vec<_> = snapshots.iter().map(|s| s.state).collect();
        states.dedup();
        assert_eq!(
            states,
            vec![
                LifecycleState::Pending,
                LifecycleState::Running,
                LifecycleState::Completed
            ]
        );
        assert_eq!(source.calls(), 3);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 3);
        assert!(!tracker.is_polling(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interactive_session_scenario() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(StatusPayload::with_status("starting")),
            Ok(ready_payload()),
        ]));
        let tracker = tracker(source.clone(), Arc::new(FakeControl::default()));

        let id = tracker.track(job_id("xyz"), JobKind::InteractiveSession);
        let mut subscription = tracker.observe(&id).unwrap();

        assert_eq!(subscription.next().await.unwrap().state, LifecycleState::Pending);
        assert!(tracker.connection_descriptor(&id).is_none());

        let starting = subscription.next().await.unwrap();
        assert_eq!(starting.state, LifecycleState::Starting);
        assert!(starting.connection.is_none());
        assert!(tracker.connection_descriptor(&id).is_none());

        let ready = subscription.next().await.unwrap();
        assert_eq!(ready.state, LifecycleState::Ready);
        let descriptor = ready.connection.clone().unwrap();
        assert_eq!(descriptor.direct_address(), "10.0.0.5:5900");
        assert_eq!(tracker.connection_descriptor(&id), Some(descriptor));

        // ready is not terminal; the session keeps being watched
        assert!(tracker.is_polling(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_fails_without_further_polls() {
        let source = Arc::new(ScriptedSource::statuses(&["weird"]));
        let tracker = tracker(source.clone(), Arc::new(FakeControl::default()));

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        let last = collect(tracker.observe(&id).unwrap()).await.pop().unwrap();

        assert_eq!(last.state, LifecycleState::Failed);
        assert_eq!(last.error.unwrap().class, ErrorClass::Protocol);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound() {
        let source = Arc::new(ScriptedSource::always(Err(FetchError::Network(
            "connection refused".to_string(),
        ))));
        let tracker = tracker(source.clone(), Arc::new(FakeControl::default()));

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        let last = collect(tracker.observe(&id).unwrap()).await.pop().unwrap();

        assert_eq!(last.state, LifecycleState::Failed);
        assert_eq!(last.attempts, 4);
        assert_eq!(last.error.unwrap().class, ErrorClass::Transient);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_is_discarded() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(ScriptedSource::statuses(&["running"]).with_gate(gate.clone()));
        let tracker = tracker(source.clone(), Arc::new(FakeControl::default()));

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 1);

        tracker.cancel(&id).await.unwrap();
        gate.notify_one();
        time::sleep(Duration::from_secs(30)).await;

        let snapshot = tracker.snapshot(&id).unwrap();
        assert_eq!(snapshot.state, LifecycleState::Pending);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracking_again_keeps_one_poll() {
        let source = Arc::new(ScriptedSource::statuses(&["running"]));
        let tracker = tracker(source.clone(), Arc::new(FakeControl::default()));

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        time::sleep(Duration::from_millis(1)).await;
        let first_record = tracker.snapshot(&id).unwrap().record_id;

        tracker.track(id.clone(), JobKind::StandardAnalysis);
        assert_ne!(tracker.snapshot(&id).unwrap().record_id, first_record);

        // a second loop would have added its own fetch at 5s
        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(source.calls(), 3);
        assert_eq!(source.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_unsubscribe_cancels_polling() {
        let source = Arc::new(ScriptedSource::statuses(&["running"]));
        let tracker = tracker(source.clone(), Arc::new(FakeControl::default()));

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        let mut first = tracker.observe(&id).unwrap();
        let second = first.clone();
        first.next().await;
        first.next().await;

        drop(first);
        assert!(tracker.is_polling(&id));

        drop(second);
        assert!(!tracker.is_polling(&id));

        let calls = source.calls();
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_resumes_polling() {
        let source = Arc::new(ScriptedSource::statuses(&["running"]));
        let tracker = tracker(source.clone(), Arc::new(FakeControl::default()));

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        time::sleep(Duration::from_millis(1)).await;
        tracker.cancel(&id).await.unwrap();
        assert!(!tracker.is_polling(&id));

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 1);

        let _subscription = tracker.observe(&id).unwrap();
        assert!(tracker.is_polling(&id));
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_job_is_not_polled_again() {
        let source = Arc::new(ScriptedSource::statuses(&["completed"]));
        let tracker = tracker(source.clone(), Arc::new(FakeControl::default()));

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        time::sleep(Duration::from_millis(1)).await;

        let snapshots = collect(tracker.observe(&id).unwrap()).await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].state, LifecycleState::Completed);
        assert!(!tracker.is_polling(&id));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_creates_new_record() {
        let source = Arc::new(ScriptedSource::statuses(&["completed"]));
        let control = Arc::new(FakeControl::default());
        let tracker = tracker(source.clone(), control.clone());

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        time::sleep(Duration::from_millis(1)).await;
        let finished = tracker.snapshot(&id).unwrap();
        assert_eq!(finished.state, LifecycleState::Completed);

        let restarted = tracker.restart(&id).await.unwrap();
        assert_eq!(restarted, id);
        assert_eq!(*control.restarted.lock().unwrap(), vec![id.clone()]);

        let fresh = tracker.snapshot(&id).unwrap();
        assert_ne!(fresh.record_id, finished.record_id);
        assert_eq!(fresh.state, LifecycleState::Pending);
        assert_eq!(fresh.attempts, 0);

        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(tracker.snapshot(&id).unwrap().state, LifecycleState::Completed);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_with_new_backend_id() {
        let source = Arc::new(ScriptedSource::statuses(&["failed"]));
        let control = Arc::new(FakeControl::with_ids(&["abc-2"]));
        let tracker = tracker(source, control);

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        let restarted = tracker.restart(&id).await.unwrap();

        assert_eq!(restarted.as_str(), "abc-2");
        assert!(tracker.snapshot(&id).is_none());
        assert!(tracker.snapshot(&restarted).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_job() {
        let source = Arc::new(ScriptedSource::statuses(&["running"]));
        let tracker = tracker(source, Arc::new(FakeControl::default()));
        let id = job_id("missing");

        assert!(matches!(tracker.observe(&id), Err(TrackerError::UnknownJob(_))));
        assert_eq!(
            tracker.restart(&id).await,
            Err(TrackerError::UnknownJob(id.clone()))
        );
        assert_eq!(
            tracker.cancel(&id).await,
            Err(TrackerError::UnknownJob(id.clone()))
        );
        assert!(tracker.connection_descriptor(&id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_creates_and_tracks() {
        let source = Arc::new(ScriptedSource::statuses(&["pending"]));
        let control = Arc::new(FakeControl::with_ids(&["new-1"]));
        let tracker = tracker(source, control.clone());

        let id = tracker.start(JobKind::InteractiveSession).await.unwrap();

        assert_eq!(id.as_str(), "new-1");
        assert_eq!(
            *control.created.lock().unwrap(),
            vec![JobKind::InteractiveSession]
        );
        assert_eq!(
            tracker.snapshot(&id).unwrap().kind,
            JobKind::InteractiveSession
        );
        assert!(tracker.is_polling(&id));
    }

    async fn ready_session(tracker: &JobTracker) -> (JobId, Subscription) {
        let id = tracker.track(job_id("xyz"), JobKind::InteractiveSession);
        let mut subscription = tracker.observe(&id).unwrap();
        while let Some(snapshot) = subscription.next().await {
            if snapshot.state == LifecycleState::Ready {
                break;
            }
        }
        (id, subscription)
    }

    fn session_source() -> Arc<ScriptedSource> {
        Arc::new(ScriptedSource::new(vec![
            Ok(StatusPayload::with_status("starting")),
            Ok(ready_payload()),
        ]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_closes_interactive_session() {
        let control = Arc::new(FakeControl::default());
        let tracker = tracker(session_source(), control.clone());
        let (id, mut subscription) = ready_session(&tracker).await;

        tracker.cancel(&id).await.unwrap();

        assert_eq!(*control.cancelled.lock().unwrap(), vec![id.clone()]);
        assert!(tracker.connection_descriptor(&id).is_none());

        let closed = subscription.next().await.unwrap();
        assert_eq!(closed.state, LifecycleState::Closed);
        assert!(closed.connection.is_none());
        assert_eq!(
            closed.error.map(|e| e.message),
            Some("Session closed by user".to_string())
        );
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_session_already_gone() {
        let control = Arc::new(FakeControl::default());
        *control.cancel_error.lock().unwrap() =
            Some(FetchError::from_status(404, "Session non trouvée"));
        let tracker = tracker(session_source(), control);
        let (id, _subscription) = ready_session(&tracker).await;

        tracker.cancel(&id).await.unwrap();

        assert_eq!(tracker.snapshot(&id).unwrap().state, LifecycleState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_session_backend_error() {
        let control = Arc::new(FakeControl::default());
        *control.cancel_error.lock().unwrap() =
            Some(FetchError::from_status(500, "Internal Server Error"));
        let tracker = tracker(session_source(), control);
        let (id, _subscription) = ready_session(&tracker).await;

        let err = tracker.cancel(&id).await.unwrap_err();

        assert!(matches!(err, TrackerError::Backend(FetchError::ServerStatus { .. })));
        assert_eq!(tracker.snapshot(&id).unwrap().state, LifecycleState::Ready);
        assert!(!tracker.is_polling(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_analysis_only_stops_polling() {
        let source = Arc::new(ScriptedSource::statuses(&["running"]));
        let control = Arc::new(FakeControl::default());
        let tracker = tracker(source, control.clone());

        let id = tracker.track(job_id("abc"), JobKind::StandardAnalysis);
        time::sleep(Duration::from_millis(1)).await;
        tracker.cancel(&id).await.unwrap();

        assert!(control.cancelled.lock().unwrap().is_empty());
        assert_eq!(tracker.snapshot(&id).unwrap().state, LifecycleState::Running);
    }
}
