//! Scripted backend fakes for tracker tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sandwatch_client::{FetchError, JobControl, StatusSource};
use sandwatch_core::domain::job::{JobId, JobKind};
use sandwatch_core::dto::job::JobDescriptor;
use sandwatch_core::dto::status::StatusPayload;
use tokio::sync::Notify;
use tokio::time::Duration;

type FetchResult = Result<StatusPayload, FetchError>;

/// Status source replaying a fixed script; the last entry repeats forever
pub(crate) struct ScriptedSource {
    script: Mutex<VecDeque<FetchResult>>,
    last: Mutex<Option<FetchResult>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Option<Duration>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedSource {
    pub(crate) fn new(results: Vec<FetchResult>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            latency: None,
            gate: None,
        }
    }

    pub(crate) fn statuses(statuses: &[&str]) -> Self {
        Self::new(
            statuses
                .iter()
                .map(|s| Ok(StatusPayload::with_status(*s)))
                .collect(),
        )
    }

    pub(crate) fn always(result: FetchResult) -> Self {
        Self::new(vec![result])
    }

    /// Every fetch takes `latency` of (tokio) time
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every fetch waits for one `notify_one` on `gate` before answering
    pub(crate) fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_result(&self) -> FetchResult {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(result) = script.pop_front() {
            *last = Some(result.clone());
            return result;
        }
        last.clone()
            .unwrap_or_else(|| Err(FetchError::Network("script is empty".to_string())))
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(&self, _job_id: &JobId) -> Result<StatusPayload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let result = self.next_result();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Job control fake recording every call
#[derive(Default)]
pub(crate) struct FakeControl {
    pub(crate) created: Mutex<Vec<JobKind>>,
    pub(crate) restarted: Mutex<Vec<JobId>>,
    pub(crate) cancelled: Mutex<Vec<JobId>>,
    /// Ids handed out by create and restart, in order; falls back to the requested id
    pub(crate) next_ids: Mutex<VecDeque<String>>,
    pub(crate) cancel_error: Mutex<Option<FetchError>>,
}

impl FakeControl {
    pub(crate) fn with_ids(ids: &[&str]) -> Self {
        let control = Self::default();
        control
            .next_ids
            .lock()
            .unwrap()
            .extend(ids.iter().map(|id| id.to_string()));
        control
    }

    fn next_id(&self, fallback: &str) -> JobId {
        let id = self
            .next_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| fallback.to_string());
        JobId::new(id).unwrap()
    }
}

#[async_trait]
impl JobControl for FakeControl {
    async fn create_job(&self, kind: JobKind) -> Result<JobDescriptor, FetchError> {
        self.created.lock().unwrap().push(kind);
        Ok(JobDescriptor {
            id: self.next_id("created"),
        })
    }

    async fn restart_job(&self, job_id: &JobId) -> Result<JobDescriptor, FetchError> {
        self.restarted.lock().unwrap().push(job_id.clone());
        Ok(JobDescriptor {
            id: self.next_id(job_id.as_str()),
        })
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<(), FetchError> {
        self.cancelled.lock().unwrap().push(job_id.clone());
        match self.cancel_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Ready payload carrying a complete connection descriptor
pub(crate) fn ready_payload() -> StatusPayload {
    let mut payload = StatusPayload::with_status("running");
    payload.host = Some("10.0.0.5".to_string());
    payload.display_port = Some(6080);
    payload.direct_port = Some(5900);
    payload.auth_token = Some("vnc-secret".to_string());
    payload
}
