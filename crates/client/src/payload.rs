//! Loading batch files from disk.

use std::path::Path;

use scanjob_core::error::CoreError;
use scanjob_core::payload::{Payload, DEFAULT_FILE_NAME};

/// Errors reading a batch file.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

/// Read a batch file, keeping its file name for the upload.
pub async fn read_payload(path: impl AsRef<Path>) -> Result<Payload, PayloadError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|source| PayloadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

    let payload = Payload::from_bytes(file_name, bytes)?;
    tracing::debug!(
        file = %path.display(),
        items = payload.item_count(),
        "Loaded batch file",
    );
    Ok(payload)
}
