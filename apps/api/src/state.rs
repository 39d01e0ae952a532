use std::sync::Arc;

use crate::config::Config;
use crate::records::RecordStore;
use crate::talent::indexer::IndexMaintainer;
use crate::talent::orchestrator::TalentSearch;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Read-only view of the resume and job tables.
    pub records: Arc<dyn RecordStore>,
    pub search: Arc<TalentSearch>,
    pub indexer: Arc<IndexMaintainer>,
    pub config: Config,
}
