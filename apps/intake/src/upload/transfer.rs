//! Transfer collaborator: hands a file batch to the external parsing service.
//!
//! The orchestrator only sees the `TransferClient` trait; `HttpTransferClient`
//! is the production backend. Progress flows back through a `ProgressReporter`,
//! which is the sending half of a channel drained into the record store.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::upload::PendingFile;

const UPLOAD_PATH: &str = "/resumes/upload";
const CHUNK_BYTES: usize = 64 * 1024;
const REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Upload failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload failed (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Upload aborted: {0}")]
    Aborted(String),
}

/// One progress report for one file of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub file_name: String,
    pub percent: u8,
}

/// `(file_name, percent)` callback handed to the transfer collaborator.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn report(&self, file_name: &str, percent: u8) {
        let event = ProgressEvent {
            file_name: file_name.to_string(),
            percent: percent.min(100),
        };
        // The receiver only goes away once the batch has been finalised.
        if self.tx.send(event).is_err() {
            debug!("Progress for {file_name} dropped after batch finished");
        }
    }
}

/// Representation of a resume created by the transfer service.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferredResume {
    #[serde(alias = "fileName")]
    pub file_name: String,
    #[serde(default, alias = "parsedData")]
    pub parsed_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    resumes: Vec<TransferredResume>,
}

#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Transfers the whole batch in one call. Either every file made it or the
    /// call fails as a whole.
    async fn transfer(
        &self,
        files: Vec<PendingFile>,
        group_id: Option<Uuid>,
        progress: ProgressReporter,
    ) -> Result<Vec<TransferredResume>, TransferError>;
}

/// Multipart upload to `{base_url}/resumes/upload`. Each file part is streamed
/// in chunks so progress can be reported as bytes leave the process.
#[derive(Clone)]
pub struct HttpTransferClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransferClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, TransferError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl TransferClient for HttpTransferClient {
    async fn transfer(
        &self,
        files: Vec<PendingFile>,
        group_id: Option<Uuid>,
        progress: ProgressReporter,
    ) -> Result<Vec<TransferredResume>, TransferError> {
        let mut form = Form::new();
        if let Some(group_id) = group_id {
            form = form.text("groupId", group_id.to_string());
        }
        for file in &files {
            let part = Part::stream_with_length(progress_body(file, progress.clone()), file.size)
                .file_name(file.name.clone())
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }

        info!(
            "Transferring {} files to {}{}",
            files.len(),
            self.base_url,
            UPLOAD_PATH
        );

        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, UPLOAD_PATH))
            .multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Transfer service returned {status}: {message}");
            return Err(TransferError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response.json().await?;
        debug!("Transfer service created {} resumes", body.resumes.len());
        Ok(body.resumes)
    }
}

/// Wraps a file's bytes in a chunked stream that reports cumulative progress.
fn progress_body(file: &PendingFile, progress: ProgressReporter) -> Body {
    let name = file.name.clone();
    let total = file.content.len().max(1);
    let chunks = split_chunks(&file.content, CHUNK_BYTES);

    let mut sent = 0usize;
    let stream = stream::iter(chunks).map(move |chunk| {
        sent += chunk.len();
        progress.report(&name, percent_of(sent, total));
        Ok::<Bytes, std::io::Error>(chunk)
    });
    Body::wrap_stream(stream)
}

fn split_chunks(content: &Bytes, chunk_bytes: usize) -> Vec<Bytes> {
    (0..content.len())
        .step_by(chunk_bytes)
        .map(|start| content.slice(start..(start + chunk_bytes).min(content.len())))
        .collect()
}

fn percent_of(sent: usize, total: usize) -> u8 {
    ((sent.min(total) * 100) / total) as u8
}
