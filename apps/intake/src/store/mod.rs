//! Record Store: the process-wide in-memory container for groups, resume
//! records, the upload session and search filters.
//!
//! Every command runs inside one write-lock critical section, so a
//! read-modify-write never interleaves with another command. Commands are
//! total: an unknown id or an illegal status transition is a logged no-op,
//! reported back as `false` / `None`.

pub mod bootstrap;
pub mod handlers;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::group::{Group, GroupPatch, NewGroup};
use crate::models::resume::{ResumePatch, ResumeRecord, ResumeStatus};
use crate::models::search::{DateRange, SearchFilters};
use crate::models::upload::{
    CompletedFile, FileDescriptor, PendingFile, SessionPatch, SessionStatus, UploadSession,
};

#[derive(Debug, Default)]
struct StoreState {
    groups: Vec<Group>,
    resumes: Vec<ResumeRecord>,
    /// Ids of deleted records. Never handed out again.
    retired_ids: HashSet<Uuid>,
    session: UploadSession,
    filters: SearchFilters,
    /// Bumped under the lock whenever records or filters change.
    revision: u64,
}

impl StoreState {
    fn resume_mut(&mut self, id: Uuid) -> Option<&mut ResumeRecord> {
        self.resumes.iter_mut().find(|r| r.id == id)
    }

    fn recount_groups(&mut self) {
        let resumes = &self.resumes;
        for group in self.groups.iter_mut() {
            group.resume_count = resumes
                .iter()
                .filter(|r| r.group_id == Some(group.id))
                .count();
        }
    }

    /// The selection still holds a file with this name.
    fn is_pending(&self, file_name: &str) -> bool {
        self.session.pending.iter().any(|p| p.name == file_name)
    }

    fn id_available(&self, id: Uuid) -> bool {
        !self.retired_ids.contains(&id) && !self.resumes.iter().any(|r| r.id == id)
    }
}

/// Outcome of atomically claiming the pending selection for a batch.
#[derive(Debug)]
pub enum BeginUpload {
    Started(Vec<PendingFile>),
    NothingPending,
    AlreadyUploading,
}

/// A batch file paired with the record tracking it.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub descriptor: FileDescriptor,
    pub resume_id: Uuid,
    /// The record already existed in `error` and was moved back to `uploading`.
    pub retried: bool,
}

/// Consistent view of records and filters taken under one lock.
#[derive(Debug, Clone)]
pub struct SearchSnapshot {
    pub records: Vec<ResumeRecord>,
    pub filters: SearchFilters,
    pub revision: u64,
}

#[derive(Clone)]
pub struct RecordStore {
    state: Arc<RwLock<StoreState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl RecordStore {
    pub fn new(groups: Vec<Group>) -> Self {
        let (revision, _) = watch::channel(0);
        let store = Self {
            state: Arc::new(RwLock::new(StoreState {
                groups,
                ..Default::default()
            })),
            revision: Arc::new(revision),
        };
        info!("Record store initialised with {} groups", store.groups().len());
        store
    }

    /// A store seeded with the fixed bootstrap groups.
    pub fn bootstrap() -> Self {
        Self::new(bootstrap::bootstrap_groups())
    }

    /// Revision counter bumped whenever records or search filters change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state.read())
    }

    /// Runs `f` under the write lock. `f` reports whether records or filters
    /// changed; if so, group counts are refreshed before the lock is released
    /// and subscribers are notified afterwards.
    fn write<R>(&self, f: impl FnOnce(&mut StoreState) -> (R, bool)) -> R {
        let (out, revision) = {
            let mut state = self.state.write();
            let (out, changed) = f(&mut state);
            let revision = changed.then(|| {
                state.recount_groups();
                state.revision += 1;
                state.revision
            });
            (out, revision)
        };
        if let Some(revision) = revision {
            // Writers may publish out of order; the counter only moves forward.
            self.revision.send_if_modified(|current| {
                if revision > *current {
                    *current = revision;
                    true
                } else {
                    false
                }
            });
        }
        out
    }

    // ── Groups ──────────────────────────────────────────────────────────────

    pub fn groups(&self) -> Vec<Group> {
        self.read(|s| s.groups.clone())
    }

    pub fn group(&self, id: Uuid) -> Option<Group> {
        self.read(|s| s.groups.iter().find(|g| g.id == id).cloned())
    }

    #[allow(dead_code)]
    pub fn set_groups(&self, groups: Vec<Group>) {
        self.write(|s| {
            s.groups = groups;
            s.recount_groups();
            ((), false)
        })
    }

    pub fn add_group(&self, new_group: NewGroup) -> Group {
        self.write(|s| {
            let group = Group::new(&new_group.name, new_group.description.as_deref());
            s.groups.push(group.clone());
            info!("Group '{}' created ({})", group.name, group.id);
            (group, false)
        })
    }

    pub fn update_group(&self, id: Uuid, patch: GroupPatch) -> Option<Group> {
        self.write(|s| {
            let Some(group) = s.groups.iter_mut().find(|g| g.id == id) else {
                warn!("update_group: unknown group {id}");
                return (None, false);
            };
            if let Some(name) = patch.name {
                group.name = name;
            }
            if let Some(description) = patch.description {
                group.description = Some(description);
            }
            (Some(group.clone()), false)
        })
    }

    /// Removes a group and clears the reference on every record that pointed
    /// at it. A group filter targeting it is dropped as well.
    pub fn delete_group(&self, id: Uuid) -> bool {
        self.write(|s| {
            let before = s.groups.len();
            s.groups.retain(|g| g.id != id);
            if s.groups.len() == before {
                warn!("delete_group: unknown group {id}");
                return (false, false);
            }

            let mut detached = 0;
            for record in s.resumes.iter_mut().filter(|r| r.group_id == Some(id)) {
                record.group_id = None;
                detached += 1;
            }
            let filter_cleared = s.filters.group_id == Some(id);
            if filter_cleared {
                s.filters.group_id = None;
            }

            info!("Group {id} deleted, {detached} resumes detached");
            (true, detached > 0 || filter_cleared)
        })
    }

    // ── Resumes ─────────────────────────────────────────────────────────────

    pub fn resumes(&self) -> Vec<ResumeRecord> {
        self.read(|s| s.resumes.clone())
    }

    pub fn resume(&self, id: Uuid) -> Option<ResumeRecord> {
        self.read(|s| s.resumes.iter().find(|r| r.id == id).cloned())
    }

    /// Bulk replace. Duplicate, retired and empty records are dropped. A
    /// record already in the store keeps its current state when the incoming
    /// status is not reachable from it, and its progress never moves back.
    pub fn set_resumes(&self, records: Vec<ResumeRecord>) {
        self.write(|s| {
            let mut seen = HashSet::new();
            let mut kept = Vec::with_capacity(records.len());
            for mut record in records {
                if s.retired_ids.contains(&record.id) || !seen.insert(record.id) {
                    continue;
                }
                if record.file_size == 0 {
                    warn!("set_resumes: dropping empty record {}", record.id);
                    continue;
                }
                record.normalize_progress();

                if let Some(current) = s.resumes.iter().find(|r| r.id == record.id) {
                    if current.status != record.status {
                        if !current.status.can_transition_to(record.status) {
                            warn!(
                                "set_resumes: illegal transition {} -> {} for {}, keeping current",
                                current.status.as_str(),
                                record.status.as_str(),
                                record.id
                            );
                            kept.push(current.clone());
                            continue;
                        }
                    } else if let (Some(old), Some(new)) = (current.progress, record.progress) {
                        record.progress = Some(old.max(new));
                    }
                }
                kept.push(record);
            }
            s.resumes = kept;
            ((), true)
        })
    }

    /// Inserts a new record. Empty files and reused ids are refused; progress
    /// is brought in line with the status.
    pub fn add_resume(&self, mut record: ResumeRecord) -> bool {
        self.write(|s| {
            if !s.id_available(record.id) {
                warn!("add_resume: id {} already used", record.id);
                return (false, false);
            }
            if record.file_size == 0 {
                warn!("add_resume: {} is empty", record.file_name);
                return (false, false);
            }
            record.normalize_progress();
            s.resumes.push(record);
            (true, true)
        })
    }

    /// Partial merge by id. The whole patch is rejected if it asks for a
    /// status transition the table does not allow.
    pub fn update_resume(&self, id: Uuid, patch: ResumePatch) -> Option<ResumeRecord> {
        self.write(|s| {
            let Some(record) = s.resume_mut(id) else {
                warn!("update_resume: unknown resume {id}");
                return (None, false);
            };
            if let Some(status) = patch.status {
                if status != record.status && !record.status.can_transition_to(status) {
                    warn!(
                        "update_resume: illegal transition {} -> {} for {id}",
                        record.status.as_str(),
                        status.as_str()
                    );
                    return (None, false);
                }
            }

            if let Some(status) = patch.status {
                if status != record.status {
                    record.transition(status);
                }
            }
            if let Some(name) = patch.file_name {
                record.file_name = name;
            }
            if let Some(percent) = patch.progress {
                record.advance_progress(percent);
            }
            if let Some(data) = patch.parsed_data {
                record.parsed_data = Some(data);
            }
            if let Some(message) = patch.error_message {
                record.error_message = Some(message);
            }
            if patch.clear_group {
                record.group_id = None;
            } else if let Some(group_id) = patch.group_id {
                record.group_id = Some(group_id);
            }
            (Some(record.clone()), true)
        })
    }

    pub fn delete_resume(&self, id: Uuid) -> bool {
        self.write(|s| {
            let before = s.resumes.len();
            s.resumes.retain(|r| r.id != id);
            if s.resumes.len() == before {
                warn!("delete_resume: unknown resume {id}");
                return (false, false);
            }
            s.retired_ids.insert(id);
            info!("Resume {id} deleted");
            (true, true)
        })
    }

    #[allow(dead_code)]
    pub fn set_progress(&self, id: Uuid, percent: u8) -> bool {
        self.write(|s| {
            let applied = s
                .resume_mut(id)
                .map(|r| r.advance_progress(percent))
                .unwrap_or(false);
            (applied, applied)
        })
    }

    #[allow(dead_code)]
    pub fn set_status(&self, id: Uuid, status: ResumeStatus) -> bool {
        self.write(|s| {
            let Some(record) = s.resume_mut(id) else {
                warn!("set_status: unknown resume {id}");
                return (false, false);
            };
            if !record.transition(status) {
                warn!(
                    "set_status: illegal transition {} -> {} for {id}",
                    record.status.as_str(),
                    status.as_str()
                );
                return (false, false);
            }
            (true, true)
        })
    }

    // ── Upload session ──────────────────────────────────────────────────────

    pub fn session(&self) -> UploadSession {
        self.read(|s| s.session.clone())
    }

    pub fn pending_descriptors(&self) -> Vec<FileDescriptor> {
        self.read(|s| s.session.pending_descriptors())
    }

    #[allow(dead_code)]
    pub fn replace_session(&self, session: UploadSession) {
        self.write(|s| {
            s.session = session;
            ((), false)
        })
    }

    /// Applies the scalar fields of `patch`. A bare `is_uploading` flag is
    /// folded into the status so the two never disagree.
    #[allow(dead_code)]
    pub fn merge_session(&self, patch: SessionPatch) {
        self.write(|s| {
            let status = match (patch.status, patch.is_uploading) {
                (Some(status), _) => Some(status),
                (None, Some(true)) => Some(SessionStatus::Uploading),
                (None, Some(false)) if s.session.is_uploading => Some(SessionStatus::Idle),
                (None, _) => None,
            };
            if let Some(status) = status {
                s.session.set_status(status);
            }
            ((), false)
        })
    }

    /// Adds files to the pending selection, skipping any (name, size) already
    /// present. Starting a new selection after a successful batch resets the
    /// session. Returns the descriptors actually added.
    pub fn add_pending(&self, files: Vec<PendingFile>) -> Vec<FileDescriptor> {
        self.write(|s| {
            let session = &mut s.session;
            if !session.is_uploading && session.status == SessionStatus::Success {
                session.completed.clear();
                session.set_status(SessionStatus::Idle);
            }

            let mut added = Vec::new();
            for file in files {
                let descriptor = file.descriptor();
                if session.contains(&descriptor) {
                    debug!("add_pending: {} already selected", descriptor.name);
                    continue;
                }
                session.pending.push(file);
                added.push(descriptor);
            }
            (added, false)
        })
    }

    pub fn remove_pending(&self, descriptor: &FileDescriptor) -> bool {
        self.write(|s| {
            let session = &mut s.session;
            let before = session.pending.len();
            session.pending.retain(|f| !f.is(descriptor));
            if session.pending.len() == before {
                return (false, false);
            }
            if !session.pending.iter().any(|f| f.name == descriptor.name) {
                session.progress.remove(&descriptor.name);
                session.errors.remove(&descriptor.name);
            }
            (true, false)
        })
    }

    /// Keeps the highest percentage seen for the file.
    pub fn set_file_progress(&self, file_name: &str, percent: u8) {
        self.write(|s| {
            let entry = s.session.progress.entry(file_name.to_string()).or_insert(0);
            *entry = (*entry).max(percent.min(100));
            ((), false)
        })
    }

    pub fn set_file_error(&self, file_name: &str, message: &str) {
        self.write(|s| {
            s.session
                .errors
                .insert(file_name.to_string(), message.to_string());
            ((), false)
        })
    }

    #[allow(dead_code)]
    pub fn push_completed(&self, file: CompletedFile) {
        self.write(|s| {
            s.session.completed.push(file);
            ((), false)
        })
    }

    /// Clears the pending selection along with its progress and error maps.
    pub fn clear_pending(&self) {
        self.write(|s| {
            s.session.clear_pending();
            if !s.session.is_uploading {
                s.session.set_status(SessionStatus::Idle);
            }
            ((), false)
        })
    }

    #[allow(dead_code)]
    pub fn set_upload_status(&self, status: SessionStatus) {
        self.write(|s| {
            s.session.set_status(status);
            ((), false)
        })
    }

    /// Claims the pending selection for a new batch and flips the session to
    /// uploading in the same step.
    pub fn begin_upload(&self) -> BeginUpload {
        self.write(|s| {
            let session = &mut s.session;
            if session.is_uploading {
                return (BeginUpload::AlreadyUploading, false);
            }
            if session.pending.is_empty() {
                return (BeginUpload::NothingPending, false);
            }
            session.completed.clear();
            session.set_status(SessionStatus::Uploading);
            (BeginUpload::Started(session.pending.clone()), false)
        })
    }

    /// Creates (or, for files whose previous attempt failed, retries) one
    /// record per batch file.
    pub fn stage_placeholders(
        &self,
        batch: &[PendingFile],
        group_id: Option<Uuid>,
    ) -> Vec<StagedFile> {
        self.write(|s| {
            let mut staged = Vec::with_capacity(batch.len());
            for file in batch {
                let failed = s.resumes.iter_mut().find(|r| {
                    r.status == ResumeStatus::Error
                        && r.file_name == file.name
                        && r.file_size == file.size
                });

                let (resume_id, retried) = match failed {
                    Some(record) => {
                        record.transition(ResumeStatus::Uploading);
                        record.group_id = group_id;
                        (record.id, true)
                    }
                    None => {
                        let record = ResumeRecord::placeholder(&file.name, file.size, group_id);
                        let id = record.id;
                        s.resumes.push(record);
                        (id, false)
                    }
                };

                if s.is_pending(&file.name) {
                    s.session.progress.insert(file.name.clone(), 0);
                }
                s.session.errors.remove(&file.name);
                staged.push(StagedFile {
                    descriptor: file.descriptor(),
                    resume_id,
                    retried,
                });
            }
            (staged, true)
        })
    }

    /// Applies one progress report to every record tracking that file name,
    /// and to the session map while the file is still selected.
    pub fn record_progress(&self, file_name: &str, percent: u8, resume_ids: &[Uuid]) {
        self.write(|s| {
            let percent = percent.min(100);
            if s.is_pending(file_name) {
                let entry = s.session.progress.entry(file_name.to_string()).or_insert(0);
                *entry = (*entry).max(percent);
            }

            let mut changed = false;
            for id in resume_ids {
                if let Some(record) = s.resume_mut(*id) {
                    changed |= record.advance_progress(percent);
                }
            }
            ((), changed)
        })
    }

    /// Finalises a successful batch: records complete, completed entries are
    /// appended, and the batch files leave the pending selection together
    /// with their progress and error entries.
    pub fn complete_upload(
        &self,
        staged: &[StagedFile],
        mut parsed_by_name: HashMap<String, Value>,
    ) -> Vec<CompletedFile> {
        self.write(|s| {
            let mut completed = Vec::with_capacity(staged.len());
            for file in staged {
                let Some(record) = s.resume_mut(file.resume_id) else {
                    warn!(
                        "complete_upload: record {} for {} is gone",
                        file.resume_id, file.descriptor.name
                    );
                    continue;
                };
                if !record.transition(ResumeStatus::Completed) {
                    warn!(
                        "complete_upload: {} is {}, not completing",
                        file.resume_id,
                        record.status.as_str()
                    );
                    continue;
                }
                if let Some(data) = parsed_by_name.remove(&file.descriptor.name) {
                    record.parsed_data = Some(data);
                }
                completed.push(CompletedFile {
                    name: file.descriptor.name.clone(),
                    size: file.descriptor.size,
                    resume_id: file.resume_id,
                });
            }

            let session = &mut s.session;
            session
                .pending
                .retain(|p| !staged.iter().any(|f| p.is(&f.descriptor)));
            for file in staged {
                if !session.pending.iter().any(|p| p.name == file.descriptor.name) {
                    session.progress.remove(&file.descriptor.name);
                    session.errors.remove(&file.descriptor.name);
                }
            }
            session.completed.extend(completed.iter().cloned());
            session.set_status(SessionStatus::Success);
            (completed, true)
        })
    }

    /// Finalises a failed batch. Every file in the batch carries the same
    /// message; whatever is still selected stays selected for a retry.
    pub fn fail_upload(&self, staged: &[StagedFile], message: &str) {
        self.write(|s| {
            for file in staged {
                if let Some(record) = s.resume_mut(file.resume_id) {
                    if record.transition(ResumeStatus::Error) {
                        record.error_message = Some(message.to_string());
                    }
                }
                if s.is_pending(&file.descriptor.name) {
                    s.session
                        .errors
                        .insert(file.descriptor.name.clone(), message.to_string());
                }
            }
            s.session.set_status(SessionStatus::Error);
            ((), true)
        })
    }

    // ── Search filters ──────────────────────────────────────────────────────

    pub fn filters(&self) -> SearchFilters {
        self.read(|s| s.filters.clone())
    }

    pub fn search_snapshot(&self) -> SearchSnapshot {
        self.read(|s| SearchSnapshot {
            records: s.resumes.clone(),
            filters: s.filters.clone(),
            revision: s.revision,
        })
    }

    pub fn set_query(&self, query: &str) {
        self.write(|s| {
            s.filters.query = query.to_string();
            ((), true)
        })
    }

    pub fn set_status_filter(&self, statuses: BTreeSet<ResumeStatus>) {
        self.write(|s| {
            s.filters.statuses = statuses;
            ((), true)
        })
    }

    pub fn set_date_range(&self, range: Option<DateRange>) {
        self.write(|s| {
            s.filters.date_range = range;
            ((), true)
        })
    }

    pub fn set_group_filter(&self, group_id: Option<Uuid>) {
        self.write(|s| {
            s.filters.group_id = group_id;
            ((), true)
        })
    }

    pub fn clear_filters(&self) {
        self.write(|s| {
            s.filters = SearchFilters::default();
            ((), true)
        })
    }
}
