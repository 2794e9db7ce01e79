//! REST API client for the scanning service.
//!
//! Wraps the two HTTP endpoints the tracker consumes (`POST /upload` and
//! `GET /status/{job_id}`) using [`reqwest`]. The [`JobApi`] trait is the
//! seam the tracker depends on, so the polling logic can be driven by an
//! in-memory implementation in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use scanjob_core::error::CoreError;
use scanjob_core::payload::Payload;
use scanjob_core::status::Status;
use scanjob_core::types::JobId;

/// Multipart field name the upload endpoint reads the file from.
pub const UPLOAD_FIELD: &str = "file";

/// Operations the tracker needs from the scanning service.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Upload a batch file and return the server-assigned job.
    async fn submit(&self, payload: &Payload) -> Result<SubmitResponse, ScanApiError>;

    /// Fetch the current status snapshot for a job.
    async fn fetch_status(&self, job_id: &JobId) -> Result<Status, ScanApiError>;
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub job_id: JobId,
    /// Destination label, when the service assigns one at upload time.
    pub tab_name: Option<String>,
}

/// Raw upload response body. The service answers `200` with
/// only `error` set when it rejects the file's contents.
#[derive(Debug, Deserialize)]
struct UploadBody {
    job_id: Option<String>,
    tab_name: Option<String>,
    error: Option<String>,
}

/// Error body shape shared by both endpoints.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Errors from the scanning service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ScanApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Scan API error ({status}): {body}")]
    ApiError {
        status: u16,
        /// Raw response body for debugging.
        body: String,
        /// The `error` field of a JSON body, if there was one.
        message: Option<String>,
    },

    /// A 2xx body that does not have the expected shape.
    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service accepted the request but refused the upload.
    #[error("Upload rejected: {0}")]
    Rejected(String),

    /// The configured base URL cannot have endpoint paths appended.
    #[error("Invalid service URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

impl ScanApiError {
    /// Message reported by the service itself, suitable for showing to
    /// the user as-is.
    pub fn reported_message(&self) -> Option<&str> {
        match self {
            ScanApiError::ApiError { message, .. } => message.as_deref(),
            ScanApiError::Rejected(message) => Some(message),
            _ => None,
        }
    }
}

/// HTTP client for one scanning service.
pub struct ScanApi {
    client: reqwest::Client,
    api_url: String,
}

impl ScanApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base URL, e.g. `http://host:8000/api`.
    pub fn new(api_url: impl Into<String>, request_timeout: Duration) -> Result<Self, ScanApiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Upload a batch file.
    ///
    /// Sends `POST /upload` with the payload as multipart field `file`.
    pub async fn upload(&self, payload: &Payload) -> Result<SubmitResponse, ScanApiError> {
        let part = Part::bytes(payload.bytes().to_vec())
            .file_name(payload.file_name().to_string())
            .mime_str("text/plain")?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(self.endpoint(&["upload"])?)
            .multipart(form)
            .send()
            .await?;

        let bytes = Self::ensure_success(response).await?.bytes().await?;
        let body: UploadBody = serde_json::from_slice(&bytes)?;

        match body.job_id {
            Some(job_id) => Ok(SubmitResponse {
                job_id: JobId::parse(job_id)?,
                tab_name: body.tab_name,
            }),
            None => Err(ScanApiError::Rejected(
                body.error
                    .unwrap_or_else(|| "response did not include a job_id".to_string()),
            )),
        }
    }

    /// Retrieve the status snapshot for a job.
    ///
    /// Sends `GET /status/{job_id}`, with the id percent-encoded as a
    /// single path segment. An unknown job comes back as an `error` body
    /// that fails to decode as a [`Status`].
    pub async fn status(&self, job_id: &JobId) -> Result<Status, ScanApiError> {
        let response = self
            .client
            .get(self.endpoint(&["status", job_id.as_str()])?)
            .send()
            .await?;

        let bytes = Self::ensure_success(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    // ---- private helpers ----

    /// `api_url` with `segments` appended, each encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ScanApiError> {
        let invalid = |reason: String| ScanApiError::InvalidUrl {
            url: self.api_url.clone(),
            reason,
        };

        let mut url = reqwest::Url::parse(&self.api_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Pass 2xx responses through; turn anything else into
    /// [`ScanApiError::ApiError`], lifting the `error` field out of a
    /// JSON body when present.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ScanApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error);

        Err(ScanApiError::ApiError {
            status: status.as_u16(),
            body,
            message,
        })
    }
}

#[async_trait]
impl JobApi for ScanApi {
    async fn submit(&self, payload: &Payload) -> Result<SubmitResponse, ScanApiError> {
        self.upload(payload).await
    }

    async fn fetch_status(&self, job_id: &JobId) -> Result<Status, ScanApiError> {
        self.status(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_message_only_for_service_messages() {
        let err = ScanApiError::ApiError {
            status: 400,
            body: r#"{"error":"bad file"}"#.into(),
            message: Some("bad file".into()),
        };
        assert_eq!(err.reported_message(), Some("bad file"));

        let err = ScanApiError::ApiError {
            status: 502,
            body: "<html>".into(),
            message: None,
        };
        assert_eq!(err.reported_message(), None);

        let err = ScanApiError::Rejected("No valid domains found in file".into());
        assert_eq!(err.reported_message(), Some("No valid domains found in file"));
    }

    #[test]
    fn endpoint_encodes_each_segment() {
        let api = ScanApi::with_client(reqwest::Client::new(), "http://host:8000/api");
        assert_eq!(
            api.endpoint(&["upload"]).unwrap().as_str(),
            "http://host:8000/api/upload"
        );
        assert_eq!(
            api.endpoint(&["status", "job?x=1"]).unwrap().as_str(),
            "http://host:8000/api/status/job%3Fx=1"
        );
        assert_eq!(
            api.endpoint(&["status", "batch/7#2"]).unwrap().as_str(),
            "http://host:8000/api/status/batch%2F7%232"
        );
    }

    #[test]
    fn endpoint_on_bare_host() {
        let api = ScanApi::with_client(reqwest::Client::new(), "http://host:8000");
        assert_eq!(
            api.endpoint(&["status", "abc-123"]).unwrap().as_str(),
            "http://host:8000/status/abc-123"
        );
    }

    #[test]
    fn unparseable_base_url_is_reported() {
        let api = ScanApi::with_client(reqwest::Client::new(), "not a url");
        assert!(matches!(
            api.endpoint(&["upload"]),
            Err(ScanApiError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let api = ScanApi::with_client(reqwest::Client::new(), "http://host:8000/api/");
        assert_eq!(api.api_url(), "http://host:8000/api");
    }
}
