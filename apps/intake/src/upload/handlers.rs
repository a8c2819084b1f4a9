//! Axum route handlers for the Upload API.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::upload::{FileDescriptor, PendingFile, UploadSession};
use crate::state::AppState;
use crate::upload::orchestrator::UploadOutcome;
use crate::upload::validation::ValidationReport;

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    pub group_id: Option<Uuid>,
}

/// POST /api/v1/uploads/selection
///
/// Multipart body; every part carrying a file name is a candidate file.
/// Accepted files join the pending selection, rejected ones are reported.
pub async fn handle_select_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ValidationReport>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let Some(name) = field.file_name().map(String::from) else {
            continue;
        };
        let content_type = field.content_type().unwrap_or_default().to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))?;
        files.push(PendingFile::new(&name, &content_type, content));
    }

    if files.is_empty() {
        return Err(AppError::Validation("No files in request".to_string()));
    }

    Ok(Json(state.uploads.select_files(files)))
}

/// GET /api/v1/uploads/session
pub async fn handle_get_session(State(state): State<AppState>) -> Json<UploadSession> {
    Json(state.store.session())
}

/// DELETE /api/v1/uploads/selection
pub async fn handle_clear_selection(State(state): State<AppState>) -> StatusCode {
    state.store.clear_pending();
    StatusCode::NO_CONTENT
}

/// DELETE /api/v1/uploads/selection/:name/:size
pub async fn handle_remove_file(
    State(state): State<AppState>,
    Path((name, size)): Path<(String, u64)>,
) -> Result<StatusCode, AppError> {
    let descriptor = FileDescriptor { name, size };
    if !state.store.remove_pending(&descriptor) {
        return Err(AppError::NotFound(format!(
            "'{}' ({} bytes) is not selected",
            descriptor.name, descriptor.size
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/uploads/submit
///
/// Runs the whole pending selection as one batch. Responds once the batch has
/// finished; progress is visible meanwhile through the session endpoint.
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<UploadOutcome>, AppError> {
    if let Some(group_id) = request.group_id {
        if state.store.group(group_id).is_none() {
            return Err(AppError::NotFound(format!("Group {group_id} not found")));
        }
    }

    match state.uploads.submit_upload(request.group_id).await? {
        UploadOutcome::Failed { message, .. } => Err(AppError::Transport(message)),
        outcome => Ok(Json(outcome)),
    }
}
