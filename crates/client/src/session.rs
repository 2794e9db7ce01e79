//! Tracking session: one job bound to its polling task.
//!
//! A [`TrackingSession`] exclusively owns the polling timer for its job.
//! The timer lives inside a spawned task and is released on every exit
//! path: the task returns on its own when a terminal phase is observed,
//! and dropping the session (reset, new submission, tracker teardown)
//! cancels and aborts it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use scanjob_core::lifecycle::{next_timer_state, TimerState};
use scanjob_core::progress::ProgressValidator;
use scanjob_core::status::Status;
use scanjob_core::types::JobId;

use crate::api::JobApi;
use crate::events::TrackerEvent;
use crate::tracker::TrackerSnapshot;

/// A running poll loop for one job.
pub struct TrackingSession {
    job_id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TrackingSession {
    /// Spawn the poll loop for `job_id`. The first fetch happens one
    /// `interval` after start.
    pub(crate) fn start<A>(
        api: Arc<A>,
        job_id: JobId,
        interval: Duration,
        state: Arc<RwLock<TrackerSnapshot>>,
        event_tx: broadcast::Sender<TrackerEvent>,
    ) -> Self
    where
        A: JobApi + ?Sized + 'static,
    {
        let cancel = CancellationToken::new();
        let poller = Poller {
            api,
            job_id: job_id.clone(),
            interval,
            state,
            event_tx,
            cancel: cancel.clone(),
        };

        tracing::info!(
            job_id = %job_id,
            interval_ms = interval.as_millis() as u64,
            "Starting status polling",
        );
        let task = tokio::spawn(poller.run());

        Self {
            job_id,
            cancel,
            task,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// `true` once the poll loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the poll loop to exit on its own (terminal phase).
    ///
    /// Must not be called again after it has returned.
    pub(crate) async fn join(&mut self) {
        if let Err(e) = (&mut self.task).await {
            if e.is_panic() {
                tracing::error!(job_id = %self.job_id, error = %e, "Polling task panicked");
            }
        }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// State moved into the spawned poll task.
struct Poller<A: ?Sized> {
    api: Arc<A>,
    job_id: JobId,
    interval: Duration,
    state: Arc<RwLock<TrackerSnapshot>>,
    event_tx: broadcast::Sender<TrackerEvent>,
    cancel: CancellationToken,
}

impl<A> Poller<A>
where
    A: JobApi + ?Sized,
{
    async fn run(self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        // A slow fetch pushes the next tick back instead of bursting.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut validator = ProgressValidator::new();
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(job_id = %self.job_id, "Polling cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            // Fetches are awaited inline, so at most one is in flight.
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                result = self.api.fetch_status(&self.job_id) => result,
            };

            match result {
                Ok(status) => {
                    consecutive_failures = 0;

                    for violation in validator.observe(&status) {
                        tracing::warn!(job_id = %self.job_id, %violation, "Inconsistent status snapshot");
                    }

                    let timer = next_timer_state(&status.phase);
                    if !self.apply(status.clone()).await {
                        return;
                    }

                    tracing::debug!(
                        job_id = %self.job_id,
                        phase = %status.phase,
                        processed = status.processed,
                        total = status.total,
                        results_count = status.results_count,
                        "Status observed",
                    );
                    let _ = self
                        .event_tx
                        .send(TrackerEvent::status_observed(self.job_id.clone(), status.clone()));

                    if timer == TimerState::Disarmed {
                        tracing::info!(
                            job_id = %self.job_id,
                            phase = %status.phase,
                            processed = status.processed,
                            total = status.total,
                            "Job reached terminal phase, polling stopped",
                        );
                        let _ = self
                            .event_tx
                            .send(TrackerEvent::terminal(self.job_id.clone(), status));
                        return;
                    }
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    tracing::warn!(
                        job_id = %self.job_id,
                        error = %e,
                        consecutive_failures,
                        "Status poll failed, retrying next tick",
                    );
                    let _ = self.event_tx.send(TrackerEvent::poll_failed(
                        self.job_id.clone(),
                        e.to_string(),
                        consecutive_failures,
                    ));
                }
            }
        }
    }

    /// Replace the stored snapshot. Returns `false` without writing when
    /// the session has been cancelled or the tracker has moved on to a
    /// different job.
    async fn apply(&self, status: Status) -> bool {
        let mut state = self.state.write().await;
        if self.cancel.is_cancelled() || state.job_id.as_ref() != Some(&self.job_id) {
            return false;
        }
        state.status = Some(status);
        true
    }
}
