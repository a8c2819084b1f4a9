use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::retrieval::retrieve_content;
use crate::state::AppState;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// GET /api/v1/resumes/:id/content
///
/// Streams the original file back inline. Auth and permission failures are
/// surfaced as-is; nothing is retried automatically except the direct-link
/// fallback for unclassified failures.
pub async fn handle_get_content(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .store
        .resume(id)
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    let content = retrieve_content(state.retriever.as_ref(), id).await?;
    let content_type = content
        .content_type
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
    let disposition = format!(
        "inline; filename=\"{}\"",
        record.file_name.replace('"', "")
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content.bytes,
    ))
}
