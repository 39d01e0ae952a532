use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::{SourceKind, SourceRef};
use crate::records::RecordCounts;
use crate::state::AppState;
use crate::talent::indexer::{
    BulkIndexReport, CollectionStatus, IndexCounters, IndexOutcome, IndexedChunk, RecordEvent,
};
use crate::talent::orchestrator::SearchOutcome;

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// POST /api/v1/talent/search
pub async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchOutcome>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Query is required".to_string()));
    }
    let conversation_id = req
        .conversation_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let limit = state.config.timeouts.search;
    let outcome = tokio::time::timeout(limit, state.search.search(query, conversation_id))
        .await
        .map_err(|_| AppError::Timeout(format!("search exceeded {}s", limit.as_secs())))??;
    Ok(Json(outcome))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub collections: Vec<CollectionStatus>,
    /// `None` when the system of record could not be reached.
    pub records: Option<RecordCounts>,
    pub indexing: IndexCounters,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
}

/// GET /api/v1/talent/status
pub async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let records = match state.records.counts().await {
        Ok(counts) => Some(counts),
        Err(e) => {
            warn!(error = %e, "record counts unavailable");
            None
        }
    };
    Json(StatusResponse {
        collections: state.indexer.collection_stats().await,
        records,
        indexing: state.indexer.counters(),
        embedding_model: state.config.embedding.model.clone(),
        embedding_dimensions: state.config.embedding.dimensions,
    })
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub action: EventAction,
    pub kind: SourceKind,
    pub id: i64,
}

impl EventRequest {
    fn event(&self) -> RecordEvent {
        let source = SourceRef {
            id: self.id,
            kind: self.kind,
        };
        match self.action {
            EventAction::Created => RecordEvent::Created(source),
            EventAction::Updated => RecordEvent::Updated(source),
            EventAction::Deleted => RecordEvent::Deleted(source),
        }
    }
}

#[derive(Serialize)]
pub struct EventAccepted {
    pub accepted: bool,
    pub source: SourceRef,
}

/// POST /api/v1/talent/events
///
/// Accepted immediately; the index work runs in the background and failures are
/// only logged.
pub async fn handle_event(
    State(state): State<AppState>,
    Json(req): Json<EventRequest>,
) -> (StatusCode, Json<EventAccepted>) {
    let event = req.event();
    let source = SourceRef {
        id: req.id,
        kind: req.kind,
    };
    let indexer = state.indexer.clone();
    tokio::spawn(async move {
        if let Err(e) = indexer.handle(event).await {
            warn!(source = %source, ?event, error = %e, "record event failed");
        }
    });
    (
        StatusCode::ACCEPTED,
        Json(EventAccepted {
            accepted: true,
            source,
        }),
    )
}

/// POST /api/v1/talent/sync
pub async fn handle_sync_all(
    State(state): State<AppState>,
) -> Result<Json<BulkIndexReport>, AppError> {
    info!("full resync requested");
    Ok(Json(state.indexer.reindex_all().await?))
}

/// POST /api/v1/talent/sync/resumes/:id
pub async fn handle_sync_resume(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IndexOutcome>, AppError> {
    Ok(Json(state.indexer.index_source(SourceRef::resume(id)).await?))
}

/// DELETE /api/v1/talent/sync/resumes/:id
pub async fn handle_remove_resume(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.indexer.remove(SourceRef::resume(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/talent/sync/jobs/:id
pub async fn handle_sync_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IndexOutcome>, AppError> {
    Ok(Json(state.indexer.index_source(SourceRef::job(id)).await?))
}

/// DELETE /api/v1/talent/sync/jobs/:id
pub async fn handle_remove_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.indexer.remove(SourceRef::job(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct IndexedChunksResponse {
    pub source: SourceRef,
    pub total: usize,
    pub chunks: Vec<IndexedChunk>,
}

async fn indexed_chunks(
    state: &AppState,
    source: SourceRef,
) -> Result<Json<IndexedChunksResponse>, AppError> {
    let chunks = state.indexer.indexed_chunks(source).await?;
    Ok(Json(IndexedChunksResponse {
        source,
        total: chunks.len(),
        chunks,
    }))
}

/// GET /api/v1/talent/index/resumes/:id
pub async fn handle_resume_chunks(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IndexedChunksResponse>, AppError> {
    indexed_chunks(&state, SourceRef::resume(id)).await
}

/// GET /api/v1/talent/index/jobs/:id
pub async fn handle_job_chunks(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IndexedChunksResponse>, AppError> {
    indexed_chunks(&state, SourceRef::job(id)).await
}
