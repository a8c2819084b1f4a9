//! Upload Orchestrator: turns the pending selection into tracked records,
//! runs the external transfer, and merges progress and results back into the
//! record store.
//!
//! Once submitted, a batch runs to completion or failure on its own task; the
//! caller going away does not cancel it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::upload::{CompletedFile, FileDescriptor, PendingFile};
use crate::store::{BeginUpload, RecordStore, StagedFile};
use crate::upload::transfer::{ProgressEvent, ProgressReporter, TransferClient, TransferError};
use crate::upload::validation::{validate_files, ValidationReport, Violation};

const INTERRUPTED_MESSAGE: &str = "Upload was interrupted before it finished";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("No files selected")]
    NoFilesSelected,

    #[error("An upload is already in progress")]
    AlreadyInProgress,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    Completed {
        files: Vec<CompletedFile>,
    },
    /// Batch-level failure: the same message is attributed to every file.
    Failed {
        message: String,
        files: Vec<FileDescriptor>,
    },
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    store: RecordStore,
    transfer: Arc<dyn TransferClient>,
    max_file_bytes: u64,
}

impl UploadOrchestrator {
    pub fn new(store: RecordStore, transfer: Arc<dyn TransferClient>, max_file_bytes: u64) -> Self {
        Self {
            store,
            transfer,
            max_file_bytes,
        }
    }

    /// Runs the validation gate over a new selection and merges the accepted
    /// files into the pending selection.
    pub fn select_files(&self, files: Vec<PendingFile>) -> ValidationReport {
        let pending = self.store.pending_descriptors();
        let mut report = validate_files(files, &pending, self.max_file_bytes);
        let added = self.store.add_pending(report.accepted.clone());

        // Another selection may have landed between the check and the merge.
        if added.len() != report.accepted.len() {
            for verdict in report.verdicts.iter_mut().filter(|v| v.accepted) {
                let descriptor = FileDescriptor {
                    name: verdict.name.clone(),
                    size: verdict.size,
                };
                if !added.contains(&descriptor) {
                    verdict.accepted = false;
                    verdict.messages.push(Violation::Duplicate.message(&verdict.name));
                    verdict.violations.push(Violation::Duplicate);
                }
            }
            report.accepted.retain(|f| added.contains(&f.descriptor()));
        }

        info!(
            "Selection processed: {} accepted, {} rejected",
            report.accepted.len(),
            report.rejected().count()
        );
        report
    }

    /// Submits every pending file as one batch.
    ///
    /// Transport failures are recorded in the upload session and returned as
    /// `UploadOutcome::Failed`; only precondition violations are errors.
    pub async fn submit_upload(&self, group_id: Option<Uuid>) -> Result<UploadOutcome, UploadError> {
        let batch = match self.store.begin_upload() {
            BeginUpload::Started(batch) => batch,
            BeginUpload::NothingPending => return Err(UploadError::NoFilesSelected),
            BeginUpload::AlreadyUploading => return Err(UploadError::AlreadyInProgress),
        };
        info!("Submitting {} files (group: {:?})", batch.len(), group_id);

        let descriptors: Vec<_> = batch.iter().map(PendingFile::descriptor).collect();
        let this = self.clone();
        match tokio::spawn(async move { this.run_batch(batch, group_id).await }).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Upload task failed: {e}");
                Ok(UploadOutcome::Failed {
                    message: INTERRUPTED_MESSAGE.to_string(),
                    files: descriptors,
                })
            }
        }
    }

    async fn run_batch(&self, batch: Vec<PendingFile>, group_id: Option<Uuid>) -> UploadOutcome {
        let mut guard = BatchGuard::new(self.store.clone());
        guard.staged = self.store.stage_placeholders(&batch, group_id);
        let retried = guard.staged.iter().filter(|f| f.retried).count();
        if retried > 0 {
            info!("Retrying {retried} previously failed records");
        }

        let mut routes: HashMap<String, Vec<Uuid>> = HashMap::new();
        for file in &guard.staged {
            routes
                .entry(file.descriptor.name.clone())
                .or_default()
                .push(file.resume_id);
        }

        let (reporter, events) = ProgressReporter::channel();
        let (finish_tx, finish_rx) = oneshot::channel();
        let drain = tokio::spawn(drain_progress(
            self.store.clone(),
            routes,
            events,
            finish_rx,
        ));

        let transfer = Arc::clone(&self.transfer);
        let result = tokio::spawn(async move { transfer.transfer(batch, group_id, reporter).await })
            .await
            .unwrap_or_else(|e| Err(TransferError::Aborted(e.to_string())));

        let _ = finish_tx.send(());
        match drain.await {
            Ok(applied) => debug!("Applied {applied} progress events"),
            Err(e) => warn!("Progress drain failed: {e}"),
        }

        let staged = guard.disarm();
        match result {
            Ok(transferred) => {
                let parsed: HashMap<String, Value> = transferred
                    .into_iter()
                    .filter_map(|t| t.parsed_data.map(|data| (t.file_name, data)))
                    .collect();
                let files = self.store.complete_upload(&staged, parsed);
                info!("Upload batch completed: {} files", files.len());
                UploadOutcome::Completed { files }
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Upload batch failed: {message}");
                self.store.fail_upload(&staged, &message);
                UploadOutcome::Failed {
                    message,
                    files: staged.into_iter().map(|f| f.descriptor).collect(),
                }
            }
        }
    }
}

/// Applies progress events one at a time until the transfer has finished,
/// then applies whatever is still buffered.
async fn drain_progress(
    store: RecordStore,
    routes: HashMap<String, Vec<Uuid>>,
    mut events: mpsc::UnboundedReceiver<ProgressEvent>,
    mut finished: oneshot::Receiver<()>,
) -> usize {
    let mut applied = 0;
    let mut apply = |event: ProgressEvent| match routes.get(&event.file_name) {
        Some(ids) => {
            store.record_progress(&event.file_name, event.percent, ids);
            applied += 1;
        }
        None => debug!("Progress for {} is not part of this batch", event.file_name),
    };

    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => apply(event),
                None => break,
            },
            _ = &mut finished => {
                events.close();
                while let Ok(event) = events.try_recv() {
                    apply(event);
                }
                break;
            }
        }
    }
    applied
}

/// Marks the batch failed if it is dropped before being disarmed, so the
/// session never stays stuck in `uploading`.
struct BatchGuard {
    store: RecordStore,
    staged: Vec<StagedFile>,
    armed: bool,
}

impl BatchGuard {
    fn new(store: RecordStore) -> Self {
        Self {
            store,
            staged: Vec::new(),
            armed: true,
        }
    }

    fn disarm(&mut self) -> Vec<StagedFile> {
        self.armed = false;
        std::mem::take(&mut self.staged)
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("Upload batch interrupted, marking {} files failed", self.staged.len());
            self.store.fail_upload(&self.staged, INTERRUPTED_MESSAGE);
        }
    }
}
