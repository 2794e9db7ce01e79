//! Job status snapshots and lifecycle phases.
//!
//! A [`Status`] is the full progress record the scanning service reports
//! for one job. It is replaced wholesale on every successful poll; the
//! client never merges fields from consecutive snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Synthesized locally right after a successful submission.
pub const PHASE_STARTING: &str = "starting";

/// The service is working through the job's items.
pub const PHASE_PROCESSING: &str = "processing";

/// Terminal success.
pub const PHASE_COMPLETED: &str = "completed";

/// Any phase starting with this marker is a terminal failure
/// (e.g. `error: rate_limited`).
pub const ERROR_PHASE_PREFIX: &str = "error";

/// Lifecycle phase carried in a status snapshot.
///
/// Parsed from the raw `status` string; the raw value is preserved so a
/// snapshot serializes back exactly as it was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    Starting,
    Processing,
    Completed,
    /// Terminal failure. Holds the full phase string, marker included.
    Error(String),
    /// Any other value the service reports. Treated as still running.
    Other(String),
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Phase::Starting => PHASE_STARTING,
            Phase::Processing => PHASE_PROCESSING,
            Phase::Completed => PHASE_COMPLETED,
            Phase::Error(raw) | Phase::Other(raw) => raw,
        }
    }

    /// `completed` and error phases absorb: nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Error(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Phase::Error(_))
    }

    /// The part of an error phase after the marker, e.g. `rate_limited`
    /// for `error: rate_limited`. `None` for non-error phases.
    pub fn error_detail(&self) -> Option<&str> {
        match self {
            Phase::Error(raw) => {
                let detail = raw
                    .strip_prefix(ERROR_PHASE_PREFIX)
                    .unwrap_or(raw)
                    .trim_start_matches([':', '-', '_', ' '])
                    .trim();
                Some(detail)
            }
            _ => None,
        }
    }
}

impl From<String> for Phase {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            PHASE_STARTING => Phase::Starting,
            PHASE_PROCESSING => Phase::Processing,
            PHASE_COMPLETED => Phase::Completed,
            s if s.starts_with(ERROR_PHASE_PREFIX) => Phase::Error(raw),
            _ => Phase::Other(raw),
        }
    }
}

impl From<&str> for Phase {
    fn from(raw: &str) -> Self {
        Phase::from(raw.to_string())
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Error(raw) | Phase::Other(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress snapshot for a job, as returned by `GET /status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "status")]
    pub phase: Phase,
    pub processed: u64,
    pub total: u64,
    /// Server-supplied display value. Stored as received; see
    /// [`derive_percentage`] for the locally computed equivalent.
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub results_count: u64,
    /// Destination label for persisted results (e.g. a sheet tab).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_name: Option<String>,
}

impl Status {
    /// The snapshot synthesized right after submission, before the first
    /// poll completes.
    pub fn starting(tab_name: Option<String>) -> Self {
        Self {
            phase: Phase::Starting,
            processed: 0,
            total: 0,
            percentage: 0.0,
            results_count: 0,
            tab_name,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Percentage from `(processed, total)`, ignoring the server value.
    pub fn derived_percentage(&self) -> u8 {
        derive_percentage(self.processed, self.total)
    }

    /// Server percentage rounded for display, clamped to `0..=100`.
    pub fn display_percentage(&self) -> u8 {
        if !self.percentage.is_finite() {
            return 0;
        }
        // Clamped to 0..=100, so the cast cannot truncate.
        self.percentage.round().clamp(0.0, 100.0) as u8
    }

    /// Whether the server percentage agrees with the derived one, within
    /// half a point (the service rounds to two decimals).
    pub fn percentage_is_consistent(&self) -> bool {
        (self.percentage - f64::from(self.derived_percentage())).abs() <= 0.5 + f64::EPSILON
    }

    /// `10 / 100 items (10%)`
    pub fn progress_line(&self) -> String {
        format!(
            "{} / {} items ({}%)",
            self.processed,
            self.total,
            self.display_percentage()
        )
    }

    /// User-facing outcome for terminal snapshots.
    pub fn outcome_message(&self) -> Option<String> {
        match &self.phase {
            Phase::Completed => Some(match &self.tab_name {
                Some(tab) => format!("Scan complete. Results are available in '{tab}'"),
                None => "Scan complete".to_string(),
            }),
            Phase::Error(raw) => Some(format!("Scan failed: {raw}")),
            _ => None,
        }
    }
}

/// `round(processed / total * 100)` when `total > 0`, else `0`.
///
/// Clamped to 100 so an over-reporting service cannot produce a bar
/// wider than full.
pub fn derive_percentage(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (processed as f64 / total as f64 * 100.0).round();
    // Clamped to 0..=100, so the cast cannot truncate.
    pct.clamp(0.0, 100.0) as u8
}
