use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::retrieval::ContentRetriever;
use crate::search::SearchEngine;
use crate::store::RecordStore;
use crate::upload::orchestrator::UploadOrchestrator;
use crate::upload::transfer::TransferClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide record store. Every component gets this same handle.
    pub store: RecordStore,
    pub uploads: UploadOrchestrator,
    pub search: Arc<SearchEngine>,
    /// Pluggable content retriever. Default: HttpContentRetriever.
    pub retriever: Arc<dyn ContentRetriever>,
    pub config: Config,
}

impl AppState {
    /// Wires the store, orchestrator and search engine together and starts the
    /// search listener. Must be called inside a Tokio runtime.
    pub fn new(
        config: Config,
        store: RecordStore,
        transfer: Arc<dyn TransferClient>,
        retriever: Arc<dyn ContentRetriever>,
    ) -> Self {
        let uploads = UploadOrchestrator::new(store.clone(), transfer, config.max_file_bytes);
        let search = Arc::new(SearchEngine::new(
            store.clone(),
            Duration::from_millis(config.search_debounce_ms),
        ));
        search.spawn_listener();

        Self {
            store,
            uploads,
            search,
            retriever,
            config,
        }
    }
}
