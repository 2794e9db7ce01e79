//! Events emitted by the job tracker.
//!
//! Renderers and tests subscribe via
//! [`JobTracker::subscribe`](crate::tracker::JobTracker::subscribe).

use chrono::Utc;
use serde::Serialize;

use scanjob_core::status::Status;
use scanjob_core::types::{JobId, Timestamp};

/// Broadcast channel capacity for tracker events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A lifecycle event for the tracked job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// The upload succeeded and polling has started.
    Submitted {
        job_id: JobId,
        tab_name: Option<String>,
        at: Timestamp,
    },

    /// The upload failed; the tracker is back in its idle state.
    SubmitFailed { message: String, at: Timestamp },

    /// A poll returned a new snapshot.
    StatusObserved {
        job_id: JobId,
        status: Status,
        at: Timestamp,
    },

    /// A poll attempt failed. Polling continues on the next tick.
    PollFailed {
        job_id: JobId,
        error: String,
        /// Consecutive failures, including this one.
        consecutive: u32,
        at: Timestamp,
    },

    /// The job reached `completed`. Polling has stopped.
    Completed {
        job_id: JobId,
        status: Status,
        at: Timestamp,
    },

    /// The job reached an error phase. Polling has stopped.
    Failed {
        job_id: JobId,
        status: Status,
        at: Timestamp,
    },

    /// The tracker discarded its job and returned to idle.
    Reset { at: Timestamp },
}

impl TrackerEvent {
    pub fn submitted(job_id: JobId, tab_name: Option<String>) -> Self {
        TrackerEvent::Submitted {
            job_id,
            tab_name,
            at: Utc::now(),
        }
    }

    pub fn submit_failed(message: String) -> Self {
        TrackerEvent::SubmitFailed {
            message,
            at: Utc::now(),
        }
    }

    pub fn status_observed(job_id: JobId, status: Status) -> Self {
        TrackerEvent::StatusObserved {
            job_id,
            status,
            at: Utc::now(),
        }
    }

    pub fn poll_failed(job_id: JobId, error: String, consecutive: u32) -> Self {
        TrackerEvent::PollFailed {
            job_id,
            error,
            consecutive,
            at: Utc::now(),
        }
    }

    /// `Completed` or `Failed`, depending on the terminal phase.
    pub fn terminal(job_id: JobId, status: Status) -> Self {
        let at = Utc::now();
        if status.phase.is_error() {
            TrackerEvent::Failed { job_id, status, at }
        } else {
            TrackerEvent::Completed { job_id, status, at }
        }
    }

    pub fn reset() -> Self {
        TrackerEvent::Reset { at: Utc::now() }
    }
}
