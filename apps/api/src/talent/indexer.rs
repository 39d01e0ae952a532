//! Index Maintainer: owns the chunk → vector point lifecycle.
//!
//! `index` is delete-then-recreate, so repeating it never accumulates stale or
//! duplicate points. Chunk-level failures are skipped; a record counts as indexed
//! when at least one point was stored.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::embedding::{check_dimensions, EmbeddingProvider};
use crate::errors::AppError;
use crate::models::{SourceRecord, SourceRef};
use crate::records::{fetch_record, RecordStore};
use crate::talent::chunker;
use crate::vector::{
    ensure_collections, Collection, FieldMatch, Payload, VectorPoint, VectorStore,
    VectorStoreError,
};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("{0} not found in the system of record")]
    NotFound(SourceRef),

    #[error("system-of-record query failed: {0}")]
    Record(#[from] sqlx::Error),

    #[error("failed to clear {collection} for {source_ref}: {error}")]
    Delete {
        source_ref: SourceRef,
        collection: Collection,
        error: VectorStoreError,
    },

    #[error("{0} has no indexable content")]
    NoChunks(SourceRef),

    #[error("none of the {chunks} chunks of {source_ref} could be stored")]
    NothingIndexed { source_ref: SourceRef, chunks: usize },
}

impl From<IndexError> for AppError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::NotFound(source) => AppError::NotFound(format!("{source} not found")),
            IndexError::Record(e) => AppError::Database(e),
            IndexError::NoChunks(source) => {
                AppError::Validation(format!("{source} has no indexable content"))
            }
            e @ (IndexError::Delete { .. } | IndexError::NothingIndexed { .. }) => {
                AppError::VectorStore(e.to_string())
            }
        }
    }
}

/// Change notification from the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEvent {
    Created(SourceRef),
    Updated(SourceRef),
    Deleted(SourceRef),
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexOutcome {
    pub source: SourceRef,
    pub chunks: usize,
    pub points_indexed: usize,
    pub collections: Vec<Collection>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIndexReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexCounters {
    pub indexed: u64,
    pub removed: u64,
    pub failed: u64,
}

/// A stored chunk as read back from the index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedChunk {
    pub point_id: String,
    pub collection: Collection,
    pub chunk_type: String,
    pub text: String,
    pub indexed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub name: &'static str,
    pub points_count: Option<u64>,
    pub available: bool,
}

pub struct IndexMaintainer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    records: Arc<dyn RecordStore>,
    indexed: AtomicU64,
    removed: AtomicU64,
    failed: AtomicU64,
}

impl IndexMaintainer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            store,
            embedder,
            records,
            indexed: AtomicU64::new(0),
            removed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Creates missing collections with the embedder's dimensionality.
    pub async fn ensure_collections(&self) -> Result<Vec<Collection>, VectorStoreError> {
        ensure_collections(self.store.as_ref(), self.embedder.dimensions()).await
    }

    /// Loads `source` from the system of record and indexes it.
    pub async fn index_source(&self, source: SourceRef) -> Result<IndexOutcome, IndexError> {
        let record = match fetch_record(self.records.as_ref(), source).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(self.fail(IndexError::NotFound(source))),
            Err(e) => return Err(self.fail(IndexError::Record(e))),
        };
        self.index(&record).await
    }

    pub async fn index(&self, record: &SourceRecord) -> Result<IndexOutcome, IndexError> {
        let source = record.source();
        self.purge(source).await.map_err(|e| self.fail(e))?;

        let chunks = chunker::chunk(record);
        if chunks.is_empty() {
            return Err(self.fail(IndexError::NoChunks(source)));
        }

        let indexed_at = Utc::now().to_rfc3339();
        let dimensions = self.embedder.dimensions();
        let mut groups: BTreeMap<Collection, Vec<VectorPoint>> = BTreeMap::new();

        for chunk in &chunks {
            let vector = match self.embedder.embed(&chunk.text).await {
                Ok(vector) => vector,
                Err(e) => {
                    warn!(
                        source_id = source.id,
                        chunk_type = chunk.chunk_type().as_str(),
                        error = %e,
                        "embedding failed, skipping chunk"
                    );
                    continue;
                }
            };
            if let Err(e) = check_dimensions(&vector, dimensions) {
                warn!(source_id = source.id, error = %e, "embedding has wrong dimension, skipping chunk");
                continue;
            }
            groups.entry(chunk.collection()).or_default().push(VectorPoint {
                id: Uuid::new_v4(),
                vector,
                payload: chunk.payload(&indexed_at),
            });
        }

        let mut points_indexed = 0;
        let mut collections = Vec::new();
        for (collection, points) in groups {
            let count = points.len();
            match self.store.upsert(collection.name(), points).await {
                Ok(()) => {
                    points_indexed += count;
                    collections.push(collection);
                }
                Err(e) => {
                    warn!(
                        source_id = source.id,
                        %collection,
                        error = %e,
                        "upsert failed, skipping collection"
                    );
                }
            }
        }

        if points_indexed == 0 {
            return Err(self.fail(IndexError::NothingIndexed {
                source_ref: source,
                chunks: chunks.len(),
            }));
        }

        self.indexed.fetch_add(1, Ordering::Relaxed);
        info!(source = %source, chunks = chunks.len(), points_indexed, "indexed record");
        Ok(IndexOutcome {
            source,
            chunks: chunks.len(),
            points_indexed,
            collections,
        })
    }

    /// Deletes every point of `source` from every collection that can hold it.
    pub async fn remove(&self, source: SourceRef) -> Result<(), IndexError> {
        self.purge(source).await.map_err(|e| self.fail(e))?;
        self.removed.fetch_add(1, Ordering::Relaxed);
        info!(source = %source, "removed record from index");
        Ok(())
    }

    /// Re-indexes every resume and job. One record failing never stops the batch.
    pub async fn reindex_all(&self) -> Result<BulkIndexReport, IndexError> {
        let mut records: Vec<SourceRecord> = self
            .records
            .resumes()
            .await?
            .into_iter()
            .map(SourceRecord::Resume)
            .collect();
        records.extend(self.records.jobs().await?.into_iter().map(SourceRecord::Job));

        let mut report = BulkIndexReport {
            total: records.len(),
            ..BulkIndexReport::default()
        };
        for record in &records {
            match self.index(record).await {
                Ok(_) => report.success_count += 1,
                Err(e) => {
                    warn!(source = %record.source(), error = %e, "record failed during bulk reindex");
                    report.failure_count += 1;
                }
            }
        }
        info!(
            total = report.total,
            success = report.success_count,
            failed = report.failure_count,
            "bulk reindex finished"
        );
        Ok(report)
    }

    pub async fn handle(&self, event: RecordEvent) -> Result<(), IndexError> {
        match event {
            RecordEvent::Created(source) | RecordEvent::Updated(source) => {
                self.index_source(source).await.map(|_| ())
            }
            RecordEvent::Deleted(source) => self.remove(source).await,
        }
    }

    /// Chunks currently stored for `source`, across its collections.
    pub async fn indexed_chunks(
        &self,
        source: SourceRef,
    ) -> Result<Vec<IndexedChunk>, VectorStoreError> {
        let filter = FieldMatch::source(source);
        let mut chunks = Vec::new();
        for &collection in Collection::for_kind(source.kind) {
            for point in self.store.scroll(collection.name(), &filter).await? {
                chunks.push(IndexedChunk {
                    point_id: point.id,
                    collection,
                    chunk_type: payload_str(&point.payload, "type").unwrap_or_default(),
                    text: payload_str(&point.payload, "text").unwrap_or_default(),
                    indexed_at: payload_str(&point.payload, "indexed_at"),
                });
            }
        }
        Ok(chunks)
    }

    /// Point counts per collection. An unreachable collection is reported, not raised.
    pub async fn collection_stats(&self) -> Vec<CollectionStatus> {
        let mut stats = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let status = match self.store.collection_info(collection.name()).await {
                Ok(info) => CollectionStatus {
                    name: collection.name(),
                    points_count: Some(info.points_count),
                    available: true,
                },
                Err(e) => {
                    warn!(%collection, error = %e, "collection info unavailable");
                    CollectionStatus {
                        name: collection.name(),
                        points_count: None,
                        available: false,
                    }
                }
            };
            stats.push(status);
        }
        stats
    }

    pub fn counters(&self) -> IndexCounters {
        IndexCounters {
            indexed: self.indexed.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    async fn purge(&self, source: SourceRef) -> Result<(), IndexError> {
        let filter = FieldMatch::source(source);
        for &collection in Collection::for_kind(source.kind) {
            self.store
                .delete(collection.name(), &filter)
                .await
                .map_err(|error| IndexError::Delete {
                    source_ref: source,
                    collection,
                    error,
                })?;
        }
        Ok(())
    }

    fn fail(&self, error: IndexError) -> IndexError {
        self.failed.fetch_add(1, Ordering::Relaxed);
        warn!(error = %error, "index operation failed");
        error
    }
}

fn payload_str(payload: &Payload, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(str::to_string)
}
