use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle status of a tracked resume.
///
/// Allowed transitions:
/// - uploading → completed | error
/// - processing → completed | error
/// - error → uploading (retry)
///
/// `completed` and `error` are terminal until an explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeStatus {
    Uploading,
    Processing,
    Completed,
    Error,
}

impl ResumeStatus {
    pub fn can_transition_to(self, next: ResumeStatus) -> bool {
        use ResumeStatus::*;
        matches!(
            (self, next),
            (Uploading, Completed)
                | (Uploading, Error)
                | (Processing, Completed)
                | (Processing, Error)
                | (Error, Uploading)
        )
    }

    /// Progress is only meaningful while bytes are moving or being parsed.
    pub fn tracks_progress(self) -> bool {
        matches!(self, ResumeStatus::Uploading | ResumeStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResumeStatus::Uploading => "uploading",
            ResumeStatus::Processing => "processing",
            ResumeStatus::Completed => "completed",
            ResumeStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub id: Uuid,
    pub file_name: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub status: ResumeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
}

impl ResumeRecord {
    /// A freshly selected file about to be transferred.
    pub fn placeholder(file_name: &str, file_size: u64, group_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            file_size,
            uploaded_at: Utc::now(),
            status: ResumeStatus::Uploading,
            progress: Some(0),
            parsed_data: None,
            error_message: None,
            group_id,
        }
    }

    /// Moves the record to `next` if the transition table allows it.
    /// Returns `false` (and leaves the record untouched) otherwise.
    pub fn transition(&mut self, next: ResumeStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        match next {
            ResumeStatus::Uploading => {
                self.progress = Some(0);
                self.error_message = None;
            }
            ResumeStatus::Processing => {
                self.progress.get_or_insert(0);
            }
            ResumeStatus::Completed | ResumeStatus::Error => {
                self.progress = None;
            }
        }
        true
    }

    /// Records a progress report, clamped to 100 and never moving backwards
    /// within one upload attempt.
    pub fn advance_progress(&mut self, percent: u8) -> bool {
        if !self.status.tracks_progress() {
            return false;
        }
        let percent = percent.min(100);
        if percent < self.progress.unwrap_or(0) {
            return false;
        }
        self.progress = Some(percent);
        true
    }

    /// Brings `progress` in line with the status: present and at most 100
    /// while uploading or processing, absent otherwise.
    pub fn normalize_progress(&mut self) {
        self.progress = if self.status.tracks_progress() {
            Some(self.progress.unwrap_or(0).min(100))
        } else {
            None
        };
    }

    /// Reads a top-level string field from the parsed payload.
    pub fn parsed_str(&self, key: &str) -> Option<&str> {
        self.parsed_data
            .as_ref()
            .and_then(|d| d.get(key))
            .and_then(|v| v.as_str())
    }
}

/// Partial update applied by id. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResumePatch {
    pub file_name: Option<String>,
    pub status: Option<ResumeStatus>,
    pub progress: Option<u8>,
    pub parsed_data: Option<Value>,
    pub error_message: Option<String>,
    pub group_id: Option<Uuid>,
    /// Detach the record from its group. Wins over `group_id`.
    #[serde(default)]
    pub clear_group: bool,
}
