pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::retrieval::handlers as retrieval;
use crate::search::handlers as search;
use crate::state::AppState;
use crate::store::handlers as records;
use crate::upload::handlers as uploads;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_request_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Groups
        .route(
            "/api/v1/groups",
            get(records::handle_list_groups).post(records::handle_create_group),
        )
        .route(
            "/api/v1/groups/:id",
            patch(records::handle_update_group).delete(records::handle_delete_group),
        )
        // Resume records
        .route("/api/v1/resumes", get(records::handle_list_resumes))
        .route(
            "/api/v1/resumes/:id",
            get(records::handle_get_resume)
                .patch(records::handle_update_resume)
                .delete(records::handle_delete_resume),
        )
        .route(
            "/api/v1/resumes/:id/content",
            get(retrieval::handle_get_content),
        )
        // Uploads
        .route(
            "/api/v1/uploads/selection",
            post(uploads::handle_select_files).delete(uploads::handle_clear_selection),
        )
        .route(
            "/api/v1/uploads/selection/:name/:size",
            delete(uploads::handle_remove_file),
        )
        .route("/api/v1/uploads/session", get(uploads::handle_get_session))
        .route("/api/v1/uploads/submit", post(uploads::handle_submit))
        // Search & ranking
        .route("/api/v1/search", get(search::handle_get_results))
        .route("/api/v1/search/query", put(search::handle_set_query))
        .route("/api/v1/search/statuses", put(search::handle_set_statuses))
        .route("/api/v1/search/date-range", put(search::handle_set_date_range))
        .route("/api/v1/search/group", put(search::handle_set_group))
        .route("/api/v1/search/filters", delete(search::handle_clear_filters))
        .route("/api/v1/candidates", get(search::handle_get_candidates))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use bytes::Bytes;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::Config;
    use crate::models::resume::{ResumeRecord, ResumeStatus};
    use crate::models::upload::PendingFile;
    use crate::retrieval::{ContentRetriever, ResumeContent, RetrievalError};
    use crate::store::RecordStore;
    use crate::upload::transfer::{
        ProgressReporter, TransferClient, TransferError, TransferredResume,
    };
    use crate::upload::validation::MAX_FILE_BYTES;

    struct StubTransfer {
        fail: bool,
    }

    #[async_trait]
    impl TransferClient for StubTransfer {
        async fn transfer(
            &self,
            files: Vec<PendingFile>,
            _group_id: Option<Uuid>,
            progress: ProgressReporter,
        ) -> Result<Vec<TransferredResume>, TransferError> {
            for file in &files {
                progress.report(&file.name, 100);
            }
            if self.fail {
                return Err(TransferError::Aborted("connection reset".to_string()));
            }
            Ok(files
                .iter()
                .map(|f| TransferredResume {
                    file_name: f.name.clone(),
                    parsed_data: Some(json!({
                        "name": f.name.trim_end_matches(".pdf"),
                        "scores": { "aggregate": f.size as f64 }
                    })),
                })
                .collect())
        }
    }

    /// Fails the primary fetch with `status`; the direct link always fails too.
    struct StubRetriever {
        status: axum::http::StatusCode,
    }

    #[async_trait]
    impl ContentRetriever for StubRetriever {
        async fn fetch(&self, _resume_id: Uuid) -> Result<ResumeContent, RetrievalError> {
            let status = reqwest::StatusCode::from_u16(self.status.as_u16())
                .unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            Err(RetrievalError::from_status(status, ""))
        }

        async fn fetch_direct(&self, _resume_id: Uuid) -> Result<ResumeContent, RetrievalError> {
            Err(RetrievalError::Unknown("direct link unavailable".to_string()))
        }
    }

    fn test_config() -> Config {
        Config {
            transfer_service_url: "http://transfer.test".to_string(),
            resume_api_url: "http://transfer.test".to_string(),
            api_token: None,
            port: 0,
            rust_log: "debug".to_string(),
            max_file_bytes: MAX_FILE_BYTES,
            max_request_bytes: 64 * 1024 * 1024,
            search_debounce_ms: 300,
        }
    }

    fn app_with(store: RecordStore, fail_transfer: bool, retrieval_status: StatusCode) -> Router {
        let state = AppState::new(
            test_config(),
            store,
            Arc::new(StubTransfer {
                fail: fail_transfer,
            }),
            Arc::new(StubRetriever {
                status: retrieval_status,
            }),
        );
        build_router(state)
    }

    fn app(store: RecordStore) -> Router {
        app_with(store, false, StatusCode::NOT_FOUND)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn multipart_request(files: &[(&str, &str, &[u8])]) -> Request<Body> {
        let boundary = "intake-test-boundary";
        let mut body = Vec::new();
        for (name, content_type, content) in files {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/uploads/selection")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(RecordStore::bootstrap());
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["groups"], 4);
    }

    #[tokio::test]
    async fn test_group_crud() {
        let app = app(RecordStore::bootstrap());
        let (status, created) = send(
            &app,
            json_request(Method::POST, "/api/v1/groups", json!({ "name": "Research" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (_, groups) = send(&app, get("/api/v1/groups")).await;
        assert_eq!(groups.as_array().unwrap().len(), 5);

        let (status, renamed) = send(
            &app,
            json_request(
                Method::PATCH,
                &format!("/api/v1/groups/{id}"),
                json!({ "name": "R&D" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["name"], "R&D");

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/v1/groups/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_empty_group_name_rejected() {
        let app = app(RecordStore::bootstrap());
        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/v1/groups", json!({ "name": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_submit_without_selection() {
        let app = app(RecordStore::new(vec![]));
        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/v1/uploads/submit", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "No files selected");
    }

    #[tokio::test]
    async fn test_select_then_submit() {
        let store = RecordStore::bootstrap();
        let group_id = store.groups()[0].id;
        let app = app(store.clone());

        let (status, report) = send(
            &app,
            multipart_request(&[
                ("a.pdf", "application/pdf", b"%PDF-1.7 resume"),
                ("photo.png", "image/png", b"\x89PNG"),
            ]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["verdicts"][0]["accepted"], true);
        assert_eq!(report["verdicts"][1]["accepted"], false);
        assert_eq!(
            report["verdicts"][1]["violations"][0]["kind"],
            "unsupported_type"
        );

        let (status, outcome) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/uploads/submit",
                json!({ "group_id": group_id }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["outcome"], "completed");
        assert_eq!(outcome["files"][0]["name"], "a.pdf");

        let (_, session) = send(&app, get("/api/v1/uploads/session")).await;
        assert_eq!(session["status"], "success");
        assert_eq!(session["pending"].as_array().unwrap().len(), 0);
        assert_eq!(session["completed"][0]["name"], "a.pdf");

        let resumes = store.resumes();
        assert_eq!(resumes.len(), 1);
        assert_eq!(resumes[0].status, ResumeStatus::Completed);
        assert_eq!(resumes[0].group_id, Some(group_id));
    }

    #[tokio::test]
    async fn test_duplicate_selection_reported() {
        let app = app(RecordStore::new(vec![]));
        let file = ("a.pdf", "application/pdf", b"%PDF".as_slice());
        send(&app, multipart_request(&[file])).await;

        let (_, report) = send(&app, multipart_request(&[file])).await;
        assert_eq!(report["verdicts"][0]["accepted"], false);
        assert_eq!(report["verdicts"][0]["violations"][0]["kind"], "duplicate");
    }

    #[tokio::test]
    async fn test_failed_transfer_is_bad_gateway_and_keeps_selection() {
        let store = RecordStore::new(vec![]);
        let app = app_with(store.clone(), true, StatusCode::NOT_FOUND);
        send(
            &app,
            multipart_request(&[
                ("x.pdf", "application/pdf", b"x"),
                ("y.pdf", "application/pdf", b"y"),
            ]),
        )
        .await;

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/v1/uploads/submit", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "TRANSPORT_ERROR");

        let (_, session) = send(&app, get("/api/v1/uploads/session")).await;
        assert_eq!(session["status"], "error");
        assert_eq!(session["errors"]["x.pdf"], session["errors"]["y.pdf"]);
        assert_eq!(session["pending"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_and_remove_selection() {
        let store = RecordStore::new(vec![]);
        let app = app(store.clone());
        send(
            &app,
            multipart_request(&[
                ("x.pdf", "application/pdf", b"xx"),
                ("y.pdf", "application/pdf", b"yy"),
            ]),
        )
        .await;

        let remove = Request::builder()
            .method(Method::DELETE)
            .uri("/api/v1/uploads/selection/x.pdf/2")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, remove).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(store.pending_descriptors().len(), 1);

        let clear = Request::builder()
            .method(Method::DELETE)
            .uri("/api/v1/uploads/selection")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, clear).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(store.pending_descriptors().is_empty());
    }

    #[tokio::test]
    async fn test_illegal_status_patch_is_conflict() {
        let store = RecordStore::new(vec![]);
        let mut record = ResumeRecord::placeholder("a.pdf", 10, None);
        record.transition(ResumeStatus::Error);
        let id = record.id;
        store.add_resume(record);
        let app = app(store);

        let (status, body) = send(
            &app,
            json_request(
                Method::PATCH,
                &format!("/api/v1/resumes/{id}"),
                json!({ "status": "completed" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, body) = send(
            &app,
            json_request(
                Method::PATCH,
                &format!("/api/v1/resumes/{id}"),
                json!({ "status": "uploading" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["progress"], 0);
    }

    #[tokio::test]
    async fn test_unknown_resume_is_not_found() {
        let app = app(RecordStore::new(vec![]));
        let (status, _) = send(&app, get(&format!("/api/v1/resumes/{}", Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_content_errors_are_mapped() {
        let store = RecordStore::new(vec![]);
        let record = ResumeRecord::placeholder("a.pdf", 10, None);
        let id = record.id;
        store.add_resume(record);

        let unauthenticated = app_with(store.clone(), false, StatusCode::UNAUTHORIZED);
        let (status, body) =
            send(&unauthenticated, get(&format!("/api/v1/resumes/{id}/content"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("sign in again"));

        let forbidden = app_with(store.clone(), false, StatusCode::FORBIDDEN);
        let (status, _) = send(&forbidden, get(&format!("/api/v1/resumes/{id}/content"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Unknown failure: direct link also fails, so the caller sees a gateway error.
        let broken = app_with(store, false, StatusCode::INTERNAL_SERVER_ERROR);
        let (status, _) = send(&broken, get(&format!("/api/v1/resumes/{id}/content"))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_and_rank() {
        let store = RecordStore::new(vec![]);
        for (name, score) in [("zoe", 3.0), ("adam", 9.0), ("zack", 9.0)] {
            let mut r = ResumeRecord::placeholder(&format!("{name}.pdf"), 10, None);
            r.transition(ResumeStatus::Completed);
            r.parsed_data = Some(json!({ "name": name, "scores": { "aggregate": score } }));
            store.add_resume(r);
        }
        store.add_resume(ResumeRecord::placeholder("zed.pdf", 10, None));
        let app = app(store);

        let (status, filters) = send(
            &app,
            json_request(Method::PUT, "/api/v1/search/query", json!({ "query": "Z" })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(filters["query"], "Z");

        tokio::time::sleep(Duration::from_millis(400)).await;
        let (_, results) = send(&app, get("/api/v1/search")).await;
        assert_eq!(results["records"].as_array().unwrap().len(), 3);
        assert_eq!(results["pending"], false);

        let (_, ranked) = send(&app, get("/api/v1/candidates?sort=score")).await;
        let names: Vec<_> = ranked["candidates"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["zack", "zoe"]);

        let (_, ranked) = send(&app, get("/api/v1/candidates?sort=name")).await;
        assert_eq!(ranked["candidates"][0]["name"], "zack");
        assert_eq!(ranked["sort"], "name");
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_filter_and_clear() {
        let store = RecordStore::new(vec![]);
        let mut done = ResumeRecord::placeholder("done.pdf", 10, None);
        done.transition(ResumeStatus::Completed);
        store.add_resume(done);
        store.add_resume(ResumeRecord::placeholder("wip.pdf", 10, None));
        let app = app(store);

        send(
            &app,
            json_request(
                Method::PUT,
                "/api/v1/search/statuses",
                json!({ "statuses": ["uploading"] }),
            ),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        let (_, results) = send(&app, get("/api/v1/search")).await;
        assert_eq!(results["records"][0]["file_name"], "wip.pdf");
        assert_eq!(results["records"].as_array().unwrap().len(), 1);

        let clear = Request::builder()
            .method(Method::DELETE)
            .uri("/api/v1/search/filters")
            .body(Body::empty())
            .unwrap();
        send(&app, clear).await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        let (_, results) = send(&app, get("/api/v1/search")).await;
        assert_eq!(results["records"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_inverted_date_range_rejected() {
        let app = app(RecordStore::new(vec![]));
        let (status, _) = send(
            &app,
            json_request(
                Method::PUT,
                "/api/v1/search/date-range",
                json!({ "from": "2024-02-01T00:00:00Z", "to": "2024-01-01T00:00:00Z" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_pending_file_from_bytes_sets_size() {
        let f = PendingFile::new("a.pdf", "application/pdf", Bytes::from_static(b"abc"));
        assert_eq!(f.size, 3);
    }
}
