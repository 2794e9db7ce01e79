//! HTTP client and job tracker for the scanning service.
//!
//! [`api::ScanApi`] wraps the two REST endpoints (upload, status).
//! [`tracker::JobTracker`] drives one submission and its polling
//! session, exposing progress through snapshots and broadcast events.

pub mod api;
pub mod config;
pub mod events;
pub mod payload;
pub mod session;
pub mod tracker;
