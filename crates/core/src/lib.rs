//! Domain model for scan job tracking.
//!
//! Pure types and functions shared by the HTTP client, the job tracker
//! and the command-line front end: job identifiers, status snapshots,
//! lifecycle phases and the polling timer transition function.

pub mod error;
pub mod lifecycle;
pub mod payload;
pub mod progress;
pub mod status;
pub mod types;
