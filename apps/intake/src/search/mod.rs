//! Search & Filter Engine: keeps a filtered view of the resume records in
//! sync with the store, recomputing at most once per quiet period.
//!
//! Any change to records or filters bumps the store revision; the listener
//! turns each bump into a debounced recomputation. Readers always get the
//! latest completed result set.

pub mod debounce;
pub mod filter;
pub mod handlers;
pub mod ranking;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::resume::ResumeRecord;
use crate::models::search::SearchFilters;
use crate::search::debounce::Debouncer;
use crate::search::filter::filter_records;
use crate::store::RecordStore;

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub filters: SearchFilters,
    pub records: Vec<ResumeRecord>,
    pub total: usize,
    /// Store revision the results were computed from.
    pub revision: u64,
    pub computed_at: DateTime<Utc>,
}

impl SearchResults {
    fn compute(store: &RecordStore) -> Self {
        let snapshot = store.search_snapshot();
        let records = filter_records(&snapshot.records, &snapshot.filters);
        Self {
            total: snapshot.records.len(),
            filters: snapshot.filters,
            records,
            revision: snapshot.revision,
            computed_at: Utc::now(),
        }
    }
}

pub struct SearchEngine {
    store: RecordStore,
    debouncer: Debouncer,
    results: Arc<watch::Sender<SearchResults>>,
    recomputations: Arc<AtomicU64>,
}

impl SearchEngine {
    /// Computes the initial result set immediately; later changes are debounced.
    pub fn new(store: RecordStore, delay: Duration) -> Self {
        let (results, _) = watch::channel(SearchResults::compute(&store));
        Self {
            store,
            debouncer: Debouncer::new(delay),
            results: Arc::new(results),
            recomputations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// (Re)starts the debounce timer. Must be called inside a Tokio runtime.
    pub fn schedule(&self) {
        let store = self.store.clone();
        let results = Arc::clone(&self.results);
        let recomputations = Arc::clone(&self.recomputations);
        self.debouncer.trigger(move || {
            let fresh = SearchResults::compute(&store);
            let n = recomputations.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(
                "Search recomputed (#{n}): {} of {} records at revision {}",
                fresh.records.len(),
                fresh.total,
                fresh.revision
            );
            results.send_replace(fresh);
        });
    }

    /// Listens for store changes and schedules a recomputation for each one.
    /// Stops once the engine is dropped.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let engine: Weak<Self> = Arc::downgrade(self);
        let mut changes = self.store.subscribe();
        info!(
            "Search listener started (debounce {}ms)",
            self.debouncer.delay().as_millis()
        );
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                match engine.upgrade() {
                    Some(engine) => engine.schedule(),
                    None => break,
                }
            }
            debug!("Search listener stopped");
        })
    }

    pub fn results(&self) -> SearchResults {
        self.results.borrow().clone()
    }

    #[allow(dead_code)]
    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.results.subscribe()
    }

    /// A recomputation is waiting for its quiet period to elapse.
    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn recomputations(&self) -> u64 {
        self.recomputations.load(Ordering::SeqCst)
    }
}
