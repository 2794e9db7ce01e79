//! Invariant checks across consecutive status snapshots of one job.
//!
//! The service is authoritative, so violations are reported for logging
//! and never used to reject a snapshot.

use crate::status::Status;

/// An invariant broken by a newly observed snapshot.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgressViolation {
    #[error("processed went backwards: {previous} -> {current}")]
    ProcessedDecreased { previous: u64, current: u64 },

    #[error("total went backwards: {previous} -> {current}")]
    TotalDecreased { previous: u64, current: u64 },

    #[error("processed {processed} exceeds total {total}")]
    ProcessedExceedsTotal { processed: u64, total: u64 },

    #[error("results_count went backwards: {previous} -> {current}")]
    ResultsDecreased { previous: u64, current: u64 },

    #[error("percentage {reported} does not match derived {derived}")]
    PercentageMismatch { reported: f64, derived: u8 },
}

/// Tracks the last snapshot of a job and checks each new one against it.
#[derive(Debug, Default)]
pub struct ProgressValidator {
    last: Option<Status>,
}

impl ProgressValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `status` against the previous observation and remember it.
    pub fn observe(&mut self, status: &Status) -> Vec<ProgressViolation> {
        let mut violations = Vec::new();

        if let Some(prev) = &self.last {
            if status.processed < prev.processed {
                violations.push(ProgressViolation::ProcessedDecreased {
                    previous: prev.processed,
                    current: status.processed,
                });
            }
            // `total` only becomes fixed once it has been reported non-zero.
            if prev.total > 0 && status.total < prev.total {
                violations.push(ProgressViolation::TotalDecreased {
                    previous: prev.total,
                    current: status.total,
                });
            }
            if status.results_count < prev.results_count {
                violations.push(ProgressViolation::ResultsDecreased {
                    previous: prev.results_count,
                    current: status.results_count,
                });
            }
        }

        if status.total > 0 && status.processed > status.total {
            violations.push(ProgressViolation::ProcessedExceedsTotal {
                processed: status.processed,
                total: status.total,
            });
        }

        if !status.percentage_is_consistent() {
            violations.push(ProgressViolation::PercentageMismatch {
                reported: status.percentage,
                derived: status.derived_percentage(),
            });
        }

        self.last = Some(status.clone());
        violations
    }

    pub fn last(&self) -> Option<&Status> {
        self.last.as_ref()
    }
}
