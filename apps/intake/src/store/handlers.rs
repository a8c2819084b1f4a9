//! Axum route handlers for groups and resume records.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::group::{Group, GroupPatch, NewGroup};
use crate::models::resume::{ResumePatch, ResumeRecord};
use crate::state::AppState;

/// GET /api/v1/groups
pub async fn handle_list_groups(State(state): State<AppState>) -> Json<Vec<Group>> {
    Json(state.store.groups())
}

/// POST /api/v1/groups
pub async fn handle_create_group(
    State(state): State<AppState>,
    Json(request): Json<NewGroup>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Group name cannot be empty".to_string()));
    }
    let group = state.store.add_group(request);
    Ok((StatusCode::CREATED, Json(group)))
}

/// PATCH /api/v1/groups/:id
pub async fn handle_update_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<GroupPatch>,
) -> Result<Json<Group>, AppError> {
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::Validation("Group name cannot be empty".to_string()));
    }
    state
        .store
        .update_group(id, patch)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Group {id} not found")))
}

/// DELETE /api/v1/groups/:id
///
/// Resumes in the group are kept and detached from it.
pub async fn handle_delete_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_group(id) {
        return Err(AppError::NotFound(format!("Group {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(State(state): State<AppState>) -> Json<Vec<ResumeRecord>> {
    Json(state.store.resumes())
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeRecord>, AppError> {
    state
        .store
        .resume(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// PATCH /api/v1/resumes/:id
///
/// A status change outside the transition table is answered with 409.
pub async fn handle_update_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ResumePatch>,
) -> Result<Json<ResumeRecord>, AppError> {
    let Some(current) = state.store.resume(id) else {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    };
    if let Some(group_id) = patch.group_id {
        if state.store.group(group_id).is_none() {
            return Err(AppError::NotFound(format!("Group {group_id} not found")));
        }
    }
    let requested = patch.status;

    state.store.update_resume(id, patch).map(Json).ok_or_else(|| {
        match requested {
            Some(next) => AppError::Conflict(format!(
                "Resume {id} cannot move from {} to {}",
                current.status.as_str(),
                next.as_str()
            )),
            None => AppError::NotFound(format!("Resume {id} not found")),
        }
    })
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_resume(id) {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
