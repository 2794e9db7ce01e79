//! `scanjob` -- submit a batch file to the scanning service and follow it
//! until it finishes.
//!
//! # Environment variables
//!
//! | Variable                       | Default                     | Description                      |
//! |--------------------------------|-----------------------------|----------------------------------|
//! | `SCANJOB_API_URL`              | `http://localhost:8000/api` | Base URL of the scanning service |
//! | `SCANJOB_POLL_INTERVAL_MS`     | `1000`                      | Milliseconds between status polls |
//! | `SCANJOB_REQUEST_TIMEOUT_SECS` | `30`                        | Per-request HTTP timeout         |
//!
//! Exit codes: `0` completed, `1` job failed or upload rejected, `2` bad
//! arguments, configuration or batch file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scanjob_client::api::ScanApi;
use scanjob_client::config::ClientConfig;
use scanjob_client::events::TrackerEvent;
use scanjob_client::payload::read_payload;
use scanjob_client::tracker::JobTracker;
use scanjob_core::status::Phase;

const EXIT_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "scanjob")]
#[command(about = "Submit a batch scan file and track it to completion", long_about = None)]
struct Cli {
    /// Batch file with one item per line
    file: PathBuf,

    /// Service base URL (overrides SCANJOB_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Poll interval in milliseconds (overrides SCANJOB_POLL_INTERVAL_MS)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanjob=info,scanjob_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // --- Configuration ---
    let mut config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url.trim_end_matches('/').to_string();
    }
    if let Some(ms) = cli.interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    tracing::info!(
        api_url = %config.api_url,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Loaded client configuration",
    );

    // --- Batch file ---
    let payload = match read_payload(&cli.file).await {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Cannot use batch file");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // --- Client ---
    let api = match ScanApi::new(config.api_url.clone(), config.request_timeout) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    let mut tracker = JobTracker::new(api, config.poll_interval);
    let progress_handle = tokio::spawn(log_progress(tracker.subscribe()));

    let submitted = tokio::select! {
        result = tracker.submit(Some(&payload)) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted during upload, nothing is being tracked");
            progress_handle.abort();
            return ExitCode::from(EXIT_FAILED);
        }
    };
    let job_id = match submitted {
        Ok(job_id) => job_id,
        Err(e) => {
            tracing::error!(error = %e, "Upload failed");
            progress_handle.abort();
            return ExitCode::from(EXIT_FAILED);
        }
    };
    tracing::info!(job_id = %job_id, badge = job_id.short(), "Tracking job");

    let status = tokio::select! {
        status = tracker.wait() => status,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(job_id = %job_id, "Interrupted, stopped tracking (the job keeps running on the service)");
            tracker.reset().await;
            progress_handle.abort();
            return ExitCode::from(EXIT_FAILED);
        }
    };
    progress_handle.abort();

    let Some(status) = status else {
        tracing::error!(job_id = %job_id, "Tracking ended without a status");
        return ExitCode::from(EXIT_FAILED);
    };

    let outcome = status.outcome_message().unwrap_or_else(|| status.progress_line());
    match status.phase {
        Phase::Completed => {
            tracing::info!(job_id = %job_id, results = status.results_count, "{outcome}");
            ExitCode::SUCCESS
        }
        _ => {
            tracing::error!(job_id = %job_id, phase = %status.phase, "{outcome}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}

/// Log a progress line whenever the observed snapshot changes.
async fn log_progress(mut events: broadcast::Receiver<TrackerEvent>) {
    let mut last_line = String::new();
    loop {
        match events.recv().await {
            Ok(TrackerEvent::StatusObserved { job_id, status, .. }) => {
                let line = status.progress_line();
                if line != last_line {
                    tracing::info!(
                        job_id = %job_id,
                        phase = %status.phase,
                        results = status.results_count,
                        "{line}",
                    );
                    last_line = line;
                }
            }
            Ok(TrackerEvent::PollFailed {
                job_id,
                error,
                consecutive,
                ..
            }) => {
                tracing::warn!(job_id = %job_id, consecutive, "Status check failed: {error}");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
