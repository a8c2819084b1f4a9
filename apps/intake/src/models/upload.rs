use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a selected file. Two selections with the same name and size
/// are treated as the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
}

/// A file handed to the validation gate, and, once accepted, held in the
/// pending selection until it is submitted.
#[derive(Debug, Clone, Serialize)]
pub struct PendingFile {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    #[serde(skip)]
    pub content: Bytes,
}

impl PendingFile {
    pub fn new(name: &str, content_type: &str, content: Bytes) -> Self {
        Self {
            name: name.to_string(),
            size: content.len() as u64,
            content_type: content_type.to_string(),
            content,
        }
    }

    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            name: self.name.clone(),
            size: self.size,
        }
    }

    pub fn is(&self, descriptor: &FileDescriptor) -> bool {
        self.name == descriptor.name && self.size == descriptor.size
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Uploading,
    Success,
    Error,
}

/// A file from the most recent batch that reached the transfer service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedFile {
    pub name: String,
    pub size: u64,
    pub resume_id: Uuid,
}

/// Ephemeral state of the in-flight or most recent upload batch.
/// Progress and error maps are keyed by file name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadSession {
    pub is_uploading: bool,
    pub pending: Vec<PendingFile>,
    pub progress: BTreeMap<String, u8>,
    pub errors: BTreeMap<String, String>,
    pub completed: Vec<CompletedFile>,
    pub status: SessionStatus,
}

impl UploadSession {
    pub fn contains(&self, descriptor: &FileDescriptor) -> bool {
        self.pending.iter().any(|f| f.is(descriptor))
    }

    pub fn pending_descriptors(&self) -> Vec<FileDescriptor> {
        self.pending.iter().map(PendingFile::descriptor).collect()
    }

    /// Drops the pending selection together with its progress and error maps.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
        self.progress.clear();
        self.errors.clear();
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.is_uploading = status == SessionStatus::Uploading;
    }
}

/// Partial replacement of the session's scalar fields.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub is_uploading: Option<bool>,
    pub status: Option<SessionStatus>,
}
