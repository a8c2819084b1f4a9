//! Resume content retrieval: fetches the raw bytes of an uploaded resume from
//! the external service for viewing or download.
//!
//! Failures are classified so the caller can show the right message:
//! unauthenticated (sign in again), forbidden, not found, or unknown. Unknown
//! failures get one more attempt through the direct file link.

pub mod handlers;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Your session has expired. Please sign in again.")]
    Unauthenticated,

    #[error("You do not have permission to view this resume.")]
    Forbidden,

    #[error("This resume file could not be found.")]
    NotFound,

    #[error("Unable to open this resume: {0}")]
    Unknown(String),
}

impl RetrievalError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => RetrievalError::Unauthenticated,
            StatusCode::FORBIDDEN => RetrievalError::Forbidden,
            StatusCode::NOT_FOUND => RetrievalError::NotFound,
            _ if body.is_empty() => RetrievalError::Unknown(format!("status {status}")),
            _ => RetrievalError::Unknown(format!("status {status}: {body}")),
        }
    }
}

impl From<reqwest::Error> for RetrievalError {
    fn from(e: reqwest::Error) -> Self {
        RetrievalError::Unknown(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ResumeContent {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ContentRetriever: Send + Sync {
    /// Fetches through the authenticated resume endpoint.
    async fn fetch(&self, resume_id: Uuid) -> Result<ResumeContent, RetrievalError>;

    /// Fetches through the direct file link.
    async fn fetch_direct(&self, resume_id: Uuid) -> Result<ResumeContent, RetrievalError>;
}

/// Fetches a resume's bytes, falling back to the direct link when the primary
/// endpoint fails for an unclassified reason.
pub async fn retrieve_content(
    retriever: &dyn ContentRetriever,
    resume_id: Uuid,
) -> Result<ResumeContent, RetrievalError> {
    match retriever.fetch(resume_id).await {
        Err(RetrievalError::Unknown(reason)) => {
            warn!("Fetching resume {resume_id} failed ({reason}), trying direct link");
            retriever.fetch_direct(resume_id).await
        }
        other => other,
    }
}

#[derive(Clone)]
pub struct HttpContentRetriever {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpContentRetriever {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get(&self, url: String) -> Result<ResumeContent, RetrievalError> {
        debug!("GET {url}");
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::from_status(status, &body));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response.bytes().await?;
        info!("Retrieved {} bytes from {url}", bytes.len());
        Ok(ResumeContent {
            bytes,
            content_type,
        })
    }
}

#[async_trait]
impl ContentRetriever for HttpContentRetriever {
    async fn fetch(&self, resume_id: Uuid) -> Result<ResumeContent, RetrievalError> {
        self.get(format!("{}/resumes/{resume_id}/file", self.base_url))
            .await
    }

    async fn fetch_direct(&self, resume_id: Uuid) -> Result<ResumeContent, RetrievalError> {
        self.get(format!("{}/files/{resume_id}", self.base_url)).await
    }
}
