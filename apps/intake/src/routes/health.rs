use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, version and a few store counters.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let session = state.store.session();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "intake",
        "groups": state.store.groups().len(),
        "resumes": state.store.resumes().len(),
        "uploading": session.is_uploading,
        "search_recomputations": state.search.recomputations()
    }))
}
