//! Axum route handlers for the Search API.
//!
//! Filter updates return immediately with the new filters; the matching
//! records appear in `GET /api/v1/search` once the debounce window closes.

use std::collections::BTreeSet;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::candidate::CandidateResult;
use crate::models::resume::ResumeStatus;
use crate::models::search::{DateRange, SearchFilters};
use crate::search::ranking::{project_candidates, rank_candidates, SortKey};
use crate::search::SearchResults;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryUpdate {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub statuses: BTreeSet<ResumeStatus>,
}

#[derive(Debug, Deserialize)]
pub struct GroupUpdate {
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateParams {
    #[serde(default)]
    pub sort: SortKey,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    #[serde(flatten)]
    pub results: SearchResults,
    /// A recomputation is scheduled; these results may be about to change.
    pub pending: bool,
}

#[derive(Debug, Serialize)]
pub struct CandidateListResponse {
    pub sort: SortKey,
    pub candidates: Vec<CandidateResult>,
}

fn accepted(state: &AppState) -> (StatusCode, Json<SearchFilters>) {
    (StatusCode::ACCEPTED, Json(state.store.filters()))
}

/// GET /api/v1/search
pub async fn handle_get_results(State(state): State<AppState>) -> Json<SearchResponse> {
    Json(SearchResponse {
        results: state.search.results(),
        pending: state.search.is_pending(),
    })
}

/// PUT /api/v1/search/query
pub async fn handle_set_query(
    State(state): State<AppState>,
    Json(update): Json<QueryUpdate>,
) -> (StatusCode, Json<SearchFilters>) {
    state.store.set_query(&update.query);
    accepted(&state)
}

/// PUT /api/v1/search/statuses
pub async fn handle_set_statuses(
    State(state): State<AppState>,
    Json(update): Json<StatusUpdate>,
) -> (StatusCode, Json<SearchFilters>) {
    state.store.set_status_filter(update.statuses);
    accepted(&state)
}

/// PUT /api/v1/search/date-range
///
/// A body with both bounds null clears the range.
pub async fn handle_set_date_range(
    State(state): State<AppState>,
    Json(range): Json<DateRange>,
) -> Result<(StatusCode, Json<SearchFilters>), AppError> {
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from > to {
            return Err(AppError::Validation(
                "date range 'from' must not be after 'to'".to_string(),
            ));
        }
    }
    let range = (range.from.is_some() || range.to.is_some()).then_some(range);
    state.store.set_date_range(range);
    Ok(accepted(&state))
}

/// PUT /api/v1/search/group
pub async fn handle_set_group(
    State(state): State<AppState>,
    Json(update): Json<GroupUpdate>,
) -> Result<(StatusCode, Json<SearchFilters>), AppError> {
    if let Some(group_id) = update.group_id {
        if state.store.group(group_id).is_none() {
            return Err(AppError::NotFound(format!("Group {group_id} not found")));
        }
    }
    state.store.set_group_filter(update.group_id);
    Ok(accepted(&state))
}

/// DELETE /api/v1/search/filters
pub async fn handle_clear_filters(State(state): State<AppState>) -> (StatusCode, Json<SearchFilters>) {
    state.store.clear_filters();
    accepted(&state)
}

/// GET /api/v1/candidates?sort=score|name|clarity|experience|reputation|loyalty
///
/// Ranks the latest search results.
pub async fn handle_get_candidates(
    State(state): State<AppState>,
    Query(params): Query<CandidateParams>,
) -> Json<CandidateListResponse> {
    let results = state.search.results();
    let candidates = project_candidates(&results.records, &state.store.groups());
    Json(CandidateListResponse {
        sort: params.sort,
        candidates: rank_candidates(candidates, params.sort),
    })
}
