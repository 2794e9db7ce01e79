//! Job tracker: submission plus the polling session for one job.
//!
//! [`JobTracker`] is the state machine behind the upload screen. It goes
//! from idle to tracking on a successful [`submit`](JobTracker::submit),
//! keeps a [`TrackerSnapshot`] current while its [`TrackingSession`]
//! polls, and goes back to idle on [`reset`](JobTracker::reset).
//!
//! Progress is observable three ways: [`JobTracker::snapshot`], a
//! detached [`SnapshotReader`], and [`TrackerEvent`]s from
//! [`JobTracker::subscribe`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};

use scanjob_core::payload::Payload;
use scanjob_core::status::Status;
use scanjob_core::types::JobId;

use crate::api::{JobApi, ScanApiError};
use crate::events::{TrackerEvent, EVENT_CHANNEL_CAPACITY};
use crate::session::TrackingSession;

/// Shown when a submission fails without a message from the service.
pub const SUBMIT_FAILED_MESSAGE: &str = "Upload failed";

/// Observable tracker state. A freshly constructed tracker and a reset
/// one both hold `TrackerSnapshot::default()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerSnapshot {
    /// Set once a submission succeeds.
    pub job_id: Option<JobId>,
    /// Latest snapshot; synthesized `starting` until the first poll lands.
    pub status: Option<Status>,
    /// User-visible submission error from the last attempt.
    pub error: Option<String>,
    /// `true` while an upload request is in flight. Cleared even when the
    /// `submit` future is dropped before the upload finishes.
    pub submitting: bool,
}

impl TrackerSnapshot {
    /// A job is present and has not reached a terminal phase.
    pub fn is_tracking(&self) -> bool {
        self.job_id.is_some() && !self.status.as_ref().is_some_and(Status::is_terminal)
    }

    /// The tracked job reached a terminal phase.
    pub fn is_finished(&self) -> bool {
        self.job_id.is_some() && self.status.as_ref().is_some_and(Status::is_terminal)
    }
}

/// Errors returned by [`JobTracker::submit`].
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// No batch file was selected. Nothing was sent.
    #[error("No batch file selected")]
    NoPayload,

    /// A job is still being tracked. Nothing was sent.
    #[error("Job {0} is still in progress")]
    JobInProgress(JobId),

    /// The upload failed. `message` is what the user should see.
    #[error("{message}")]
    SubmitFailed {
        message: String,
        #[source]
        source: ScanApiError,
    },
}

/// Read-only view of a tracker's state that can outlive borrows of the
/// tracker itself (e.g. held by a renderer task).
#[derive(Clone)]
pub struct SnapshotReader {
    state: Arc<RwLock<TrackerSnapshot>>,
    submitting: Arc<AtomicBool>,
}

impl SnapshotReader {
    pub async fn snapshot(&self) -> TrackerSnapshot {
        read_snapshot(&self.state, &self.submitting).await
    }
}

async fn read_snapshot(
    state: &RwLock<TrackerSnapshot>,
    submitting: &AtomicBool,
) -> TrackerSnapshot {
    let mut snapshot = state.read().await.clone();
    snapshot.submitting = submitting.load(Ordering::SeqCst);
    snapshot
}

/// Holds the in-flight flag for one upload and clears it on drop.
struct SubmittingGuard(Arc<AtomicBool>);

impl SubmittingGuard {
    fn raise(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for SubmittingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Submits one batch file and tracks it to a terminal phase.
///
/// Dropping the tracker stops any active polling. The backend job is not
/// cancelled.
pub struct JobTracker<A: ?Sized> {
    api: Arc<A>,
    poll_interval: Duration,
    state: Arc<RwLock<TrackerSnapshot>>,
    /// Kept outside `state` so a cancelled upload can clear it without
    /// awaiting the lock.
    submitting: Arc<AtomicBool>,
    /// At most one; replacing or dropping it stops its timer.
    session: Option<TrackingSession>,
    event_tx: broadcast::Sender<TrackerEvent>,
}

impl<A> JobTracker<A>
where
    A: JobApi + ?Sized + 'static,
{
    pub fn new(api: Arc<A>, poll_interval: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            poll_interval,
            state: Arc::new(RwLock::new(TrackerSnapshot::default())),
            submitting: Arc::new(AtomicBool::new(false)),
            session: None,
            event_tx,
        }
    }

    /// Subscribe to tracker events.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.event_tx.subscribe()
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            state: Arc::clone(&self.state),
            submitting: Arc::clone(&self.submitting),
        }
    }

    pub async fn snapshot(&self) -> TrackerSnapshot {
        read_snapshot(&self.state, &self.submitting).await
    }

    /// `true` while a poll loop is running.
    pub fn is_polling(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Upload `payload` and start polling the resulting job.
    ///
    /// Rejected without any network call when `payload` is `None` or a
    /// job is still in progress. A job that already reached a terminal
    /// phase is discarded first, as if [`reset`](Self::reset) had been
    /// called. `&mut self` rules out a second concurrent submission.
    ///
    /// On failure the tracker stays idle, with the user-visible message
    /// stored in [`TrackerSnapshot::error`]. Dropping the returned future
    /// mid-upload also leaves it idle; whatever the service did with the
    /// upload is not tracked.
    pub async fn submit(&mut self, payload: Option<&Payload>) -> Result<JobId, TrackerError> {
        let Some(payload) = payload else {
            return Err(TrackerError::NoPayload);
        };

        let previous_finished = {
            let state = self.state.read().await;
            if state.is_tracking() {
                if let Some(job_id) = &state.job_id {
                    return Err(TrackerError::JobInProgress(job_id.clone()));
                }
            }
            state.is_finished()
        };
        if previous_finished {
            self.reset().await;
        }

        let in_flight = SubmittingGuard::raise(&self.submitting);
        self.state.write().await.error = None;

        tracing::info!(
            file = payload.file_name(),
            items = payload.item_count(),
            "Submitting batch file",
        );

        match self.api.submit(payload).await {
            Ok(response) => {
                {
                    let mut state = self.state.write().await;
                    state.job_id = Some(response.job_id.clone());
                    state.status = Some(Status::starting(response.tab_name.clone()));
                }
                drop(in_flight);

                tracing::info!(
                    job_id = %response.job_id,
                    tab_name = ?response.tab_name,
                    "Batch submitted",
                );
                let _ = self.event_tx.send(TrackerEvent::submitted(
                    response.job_id.clone(),
                    response.tab_name,
                ));

                self.session = Some(TrackingSession::start(
                    Arc::clone(&self.api),
                    response.job_id.clone(),
                    self.poll_interval,
                    Arc::clone(&self.state),
                    self.event_tx.clone(),
                ));

                Ok(response.job_id)
            }
            Err(e) => {
                let message = e
                    .reported_message()
                    .map(str::to_owned)
                    .unwrap_or_else(|| SUBMIT_FAILED_MESSAGE.to_string());

                self.state.write().await.error = Some(message.clone());
                drop(in_flight);

                tracing::warn!(error = %e, message = %message, "Submission failed");
                let _ = self
                    .event_tx
                    .send(TrackerEvent::submit_failed(message.clone()));

                Err(TrackerError::SubmitFailed { message, source: e })
            }
        }
    }

    /// Wait until the poll loop stops on a terminal phase and return the
    /// final snapshot. Returns the current status immediately when
    /// nothing is polling.
    pub async fn wait(&mut self) -> Option<Status> {
        // Released only after the join completes, so a caller that gives
        // up waiting (e.g. under a timeout) leaves polling running.
        if let Some(session) = self.session.as_mut() {
            session.join().await;
            self.session = None;
        }
        self.state.read().await.status.clone()
    }

    /// Discard the job, its status and any error, stopping the poll
    /// loop if it is still running.
    pub async fn reset(&mut self) {
        // Cancel before taking the lock so an in-flight poll cannot
        // write after the state is cleared.
        if let Some(session) = self.session.take() {
            tracing::info!(job_id = %session.job_id(), "Discarding tracked job");
            drop(session);
        }

        *self.state.write().await = TrackerSnapshot::default();
        let _ = self.event_tx.send(TrackerEvent::reset());
    }
}
