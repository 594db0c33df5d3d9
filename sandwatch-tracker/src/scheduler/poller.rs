//! Status poller
//!
//! Each started poll runs in its own task: fetch, hand the result to the
//! observer, sleep, repeat. A new fetch is never issued while one is
//! outstanding, so results reach the observer in request order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sandwatch_client::{FetchError, StatusSource};
use sandwatch_core::domain::job::JobId;
use sandwatch_core::dto::status::StatusPayload;
use tokio::sync::Notify;
use tokio::time::{self, Duration};
use tracing::debug;
use uuid::Uuid;

/// What the poll loop should do after a result was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

/// Receives every status result of a poll loop
pub trait PollObserver: Send + 'static {
    /// Handles one fetch result
    ///
    /// Called only while `handle` is not cancelled; implementations that
    /// share state with other tasks should re-check under their own lock.
    fn on_result(
        &mut self,
        handle: &PollHandle,
        result: Result<StatusPayload, FetchError>,
    ) -> PollControl;
}

/// Cancellable handle for one active polling loop
///
/// Clones refer to the same loop. `cancelled` is set at most once and
/// never cleared.
#[derive(Debug, Clone)]
pub struct PollHandle {
    inner: Arc<HandleState>,
}

#[derive(Debug)]
struct HandleState {
    id: Uuid,
    job_id: JobId,
    interval: Duration,
    cancelled: AtomicBool,
    wake: Notify,
}

impl PollHandle {
    fn new(job_id: JobId, interval: Duration) -> Self {
        Self {
            inner: Arc::new(HandleState {
                id: Uuid::new_v4(),
                job_id,
                interval,
                cancelled: AtomicBool::new(false),
                wake: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn job_id(&self) -> &JobId {
        &self.inner.job_id
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels the loop; returns `true` only for the call that flipped the flag
    ///
    /// A sleeping loop wakes up and exits. An in-flight fetch is left to
    /// finish, and its result is discarded.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::SeqCst);
        if first {
            // notify_one stores a permit, so a loop that is about to sleep still wakes
            self.inner.wake.notify_one();
        }
        first
    }

    async fn sleep_or_cancel(&self) {
        tokio::select! {
            _ = time::sleep(self.inner.interval) => {}
            _ = self.inner.wake.notified() => {}
        }
    }
}

/// Drives repeated status fetches
pub struct PollingScheduler {
    source: Arc<dyn StatusSource>,
}

impl PollingScheduler {
    /// Creates a new scheduler fetching from `source`
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self { source }
    }

    /// Starts polling `job_id`
    ///
    /// The first fetch is issued immediately, the next ones `interval`
    /// after the previous result was handled. Polling ends when the handle is
    /// cancelled or the observer returns [`PollControl::Stop`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<O: PollObserver>(
        &self,
        job_id: JobId,
        interval: Duration,
        observer: O,
    ) -> PollHandle {
        let handle = PollHandle::new(job_id, interval);
        debug!(
            "Starting poll {} for job {} (interval: {:?})",
            handle.id(),
            handle.job_id(),
            interval
        );

        let source = Arc::clone(&self.source);
        let task_handle = handle.clone();
        tokio::spawn(async move {
            run_poll_loop(source, task_handle, observer).await;
        });

        handle
    }

    /// Cancels a poll started by this scheduler
    pub fn cancel(&self, handle: &PollHandle) {
        if handle.cancel() {
            debug!("Cancelled poll {} for job {}", handle.id(), handle.job_id());
        }
    }
}

async fn run_poll_loop<O: PollObserver>(
    source: Arc<dyn StatusSource>,
    handle: PollHandle,
    mut observer: O,
) {
    while !handle.is_cancelled() {
        let result = source.fetch_status(handle.job_id()).await;

        if handle.is_cancelled() {
            debug!(
                "Discarding status response for job {} (poll {} cancelled)",
                handle.job_id(),
                handle.id()
            );
            break;
        }

        if observer.on_result(&handle, result) == PollControl::Stop {
            handle.cancel();
            break;
        }

        handle.sleep_or_cancel().await;
    }

    debug!("Poll {} for job {} finished", handle.id(), handle.job_id());
}
