//! Vector Index Store: named collections of (id, vector, payload) points.
//!
//! `QdrantStore` is the production backend (Qdrant REST API). `MemoryVectorStore`
//! is used when no Qdrant URL is configured and throughout the test suite.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{SourceKind, SourceRef};

pub mod memory;
pub mod qdrant;

pub use memory::MemoryVectorStore;
pub use qdrant::QdrantStore;

/// Point payload. Always carries `text`, `type`, `source_kind`, `indexed_at`
/// and the group key (`resume_id` or `job_id`).
pub type Payload = Map<String, Value>;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("collection '{0}' does not exist")]
    MissingCollection(String),

    #[error("collection '{collection}' expects {expected}-dimensional vectors, got {actual}")]
    Dimension {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// The collections the index is partitioned into, one per chunk family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Resumes,
    Skills,
    Experience,
    Education,
    Jobs,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Resumes,
        Collection::Skills,
        Collection::Experience,
        Collection::Education,
        Collection::Jobs,
    ];

    const RESUME_COLLECTIONS: [Collection; 4] = [
        Collection::Resumes,
        Collection::Skills,
        Collection::Experience,
        Collection::Education,
    ];

    const JOB_COLLECTIONS: [Collection; 1] = [Collection::Jobs];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Resumes => "talent_resumes",
            Collection::Skills => "talent_skills",
            Collection::Experience => "talent_experience",
            Collection::Education => "talent_education",
            Collection::Jobs => "talent_jobs",
        }
    }

    /// Every collection that can hold points for records of `kind`.
    pub fn for_kind(kind: SourceKind) -> &'static [Collection] {
        match kind {
            SourceKind::Resume => &Self::RESUME_COLLECTIONS,
            SourceKind::Job => &Self::JOB_COLLECTIONS,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A search hit as returned by the store, before any validation.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

/// A point read back by scroll (no vector).
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub id: String,
    pub payload: Payload,
}

/// Exact-match filter on one integer payload field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub key: &'static str,
    pub value: i64,
}

impl FieldMatch {
    /// Matches every point belonging to `source`.
    pub fn source(source: SourceRef) -> Self {
        Self {
            key: source.kind.id_field(),
            value: source.id,
        }
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        payload
            .get(self.key)
            .and_then(payload_i64)
            .is_some_and(|v| v == self.value)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub points_count: u64,
}

/// Reads an integer out of a payload value, accepting numeric strings.
pub fn payload_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError>;

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), VectorStoreError>;

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, VectorStoreError>;

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>)
        -> Result<(), VectorStoreError>;

    /// Top `limit` points by similarity, descending, dropping anything below `score_threshold`.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError>;

    async fn delete(&self, collection: &str, filter: &FieldMatch) -> Result<(), VectorStoreError>;

    /// Every point matching `filter`.
    async fn scroll(
        &self,
        collection: &str,
        filter: &FieldMatch,
    ) -> Result<Vec<StoredPoint>, VectorStoreError>;
}

/// Creates any missing talent collections. Existing collections are left alone.
pub async fn ensure_collections(
    store: &dyn VectorStore,
    dimensions: usize,
) -> Result<Vec<Collection>, VectorStoreError> {
    let existing = store.list_collections().await?;
    let mut created = Vec::new();
    for collection in Collection::ALL {
        if existing.iter().any(|name| name == collection.name()) {
            continue;
        }
        store
            .create_collection(collection.name(), dimensions, Distance::Cosine)
            .await?;
        tracing::info!(%collection, dimensions, "created vector collection");
        created.push(collection);
    }
    Ok(created)
}
