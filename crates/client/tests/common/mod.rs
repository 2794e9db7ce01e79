//! Shared fixtures for tracker integration tests.
//!
//! [`ScriptedApi`] replays queued submit and status results in order and
//! counts every call, so tests can assert exactly how many requests the
//! tracker issued.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use scanjob_client::api::{JobApi, ScanApiError, SubmitResponse};
use scanjob_core::payload::Payload;
use scanjob_core::status::{derive_percentage, Phase, Status};
use scanjob_core::types::JobId;

/// Poll interval used by tracker tests (matches the production default).
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct ScriptedApi {
    submits: Mutex<VecDeque<Result<SubmitResponse, ScanApiError>>>,
    polls: Mutex<VecDeque<Result<Status, ScanApiError>>>,
    submit_delay: Duration,
    poll_delay: Duration,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            submits: Mutex::new(VecDeque::new()),
            polls: Mutex::new(VecDeque::new()),
            submit_delay: Duration::ZERO,
            poll_delay: Duration::ZERO,
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_submit(self, result: Result<SubmitResponse, ScanApiError>) -> Self {
        self.submits.lock().unwrap().push_back(result);
        self
    }

    pub fn with_polls(self, results: impl IntoIterator<Item = Result<Status, ScanApiError>>) -> Self {
        self.polls.lock().unwrap().extend(results);
        self
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobApi for ScriptedApi {
    async fn submit(&self, _payload: &Payload) -> Result<SubmitResponse, ScanApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        let next = self.submits.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(accepted("abc-123")))
    }

    async fn fetch_status(&self, _job_id: &JobId) -> Result<Status, ScanApiError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }
        let next = self.polls.lock().unwrap().pop_front();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        // An exhausted script means the job is still running.
        next.unwrap_or_else(|| Ok(processing(0, 100, 0)))
    }
}

pub fn accepted(job_id: &str) -> SubmitResponse {
    SubmitResponse {
        job_id: JobId::parse(job_id).unwrap(),
        tab_name: None,
    }
}

pub fn processing(processed: u64, total: u64, results_count: u64) -> Status {
    Status {
        phase: Phase::Processing,
        processed,
        total,
        percentage: f64::from(derive_percentage(processed, total)),
        results_count,
        tab_name: None,
    }
}

pub fn completed(total: u64, results_count: u64, tab_name: &str) -> Status {
    Status {
        phase: Phase::Completed,
        processed: total,
        total,
        percentage: 100.0,
        results_count,
        tab_name: Some(tab_name.to_string()),
    }
}

pub fn failed(phase: &str, processed: u64, total: u64) -> Status {
    Status {
        phase: Phase::from(phase),
        processed,
        total,
        percentage: f64::from(derive_percentage(processed, total)),
        results_count: 0,
        tab_name: None,
    }
}

/// A poll failure the way a truncated or unexpected body surfaces.
pub fn transient() -> ScanApiError {
    ScanApiError::Decode(serde_json::from_str::<Status>("{").unwrap_err())
}

pub fn payload() -> Payload {
    Payload::from_bytes("domains.txt", b"example.com\nexample.org\n".to_vec()).unwrap()
}
