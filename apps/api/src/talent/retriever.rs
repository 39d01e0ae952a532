//! Multi-Collection Retriever: one weighted similarity search per candidate collection.
//!
//! The query is embedded once and the collection searches run concurrently.
//! Every hit is validated before it is kept; invalid hits are dropped silently.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::models::SourceKind;
use crate::vector::{payload_i64, Collection, Payload, ScoredPoint, VectorStore};

/// Payload fields that may travel with a hit. Anything else stays in the index.
const SAFE_METADATA_FIELDS: [&str; 10] = [
    "email",
    "phone",
    "filename",
    "skills",
    "job_title",
    "company",
    "duration",
    "degree",
    "institution",
    "year",
];

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("all {0} collection searches failed")]
    AllCollectionsFailed(usize),
}

/// Weight, threshold and limit for one collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionSearch {
    pub collection: Collection,
    pub weight: f32,
    pub score_threshold: f32,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalPlan {
    pub searches: Vec<CollectionSearch>,
}

impl RetrievalPlan {
    /// Candidate search over the four resume collections. Skills and experience
    /// carry the strongest signal; education the weakest, with half the limit.
    pub fn for_candidates(top_k: usize) -> Self {
        let top_k = top_k.max(1);
        let search = |collection, weight, score_threshold, limit| CollectionSearch {
            collection,
            weight,
            score_threshold,
            limit,
        };
        Self {
            searches: vec![
                search(Collection::Resumes, 1.0, 0.2, top_k),
                search(Collection::Skills, 2.0, 0.25, top_k),
                search(Collection::Experience, 1.8, 0.25, top_k),
                search(Collection::Education, 0.9, 0.2, (top_k / 2).max(1)),
            ],
        }
    }
}

/// A validated search hit.
#[derive(Debug, Clone, Serialize)]
pub struct RawHit {
    pub source_id: i64,
    pub name: String,
    pub text: String,
    pub chunk_type: String,
    pub raw_score: f32,
    /// `raw_score` × collection weight.
    pub weighted_score: f32,
    pub collection: Collection,
    pub metadata: Payload,
}

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Embeds `query_text` and searches every collection of `plan`, returning hits in
    /// plan order, each collection's hits by descending similarity.
    ///
    /// A failing collection is skipped; only a failed embedding or every
    /// collection failing is an error.
    pub async fn retrieve(
        &self,
        query_text: &str,
        plan: &RetrievalPlan,
    ) -> Result<Vec<RawHit>, RetrievalError> {
        let vector = self.embedder.embed(query_text).await?;

        let searches = plan.searches.iter().map(|search| {
            let vector = &vector;
            async move {
                let result = self
                    .store
                    .search(
                        search.collection.name(),
                        vector,
                        search.limit,
                        Some(search.score_threshold),
                    )
                    .await;
                (search, result)
            }
        });

        let mut hits = Vec::new();
        let mut failures = 0;
        for (search, result) in join_all(searches).await {
            match result {
                Ok(points) => {
                    let returned = points.len();
                    let before = hits.len();
                    hits.extend(points.into_iter().filter_map(|p| validate_hit(p, search)));
                    debug!(
                        collection = %search.collection,
                        returned,
                        valid = hits.len() - before,
                        "collection searched"
                    );
                }
                Err(e) => {
                    failures += 1;
                    warn!(collection = %search.collection, error = %e, "collection search failed");
                }
            }
        }

        if failures > 0 && failures == plan.searches.len() {
            return Err(RetrievalError::AllCollectionsFailed(failures));
        }
        info!(hits = hits.len(), failed_collections = failures, "retrieval complete");
        Ok(hits)
    }
}

/// Keeps a hit only if it has an integer resume id, non-blank text and a finite
/// similarity in [0, 1].
fn validate_hit(point: ScoredPoint, search: &CollectionSearch) -> Option<RawHit> {
    let source_id = point
        .payload
        .get(SourceKind::Resume.id_field())
        .and_then(payload_i64)?;
    let text = point
        .payload
        .get("text")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())?
        .to_string();
    if !point.score.is_finite() || !(0.0..=1.0).contains(&point.score) {
        return None;
    }

    let name = point
        .payload
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();
    let chunk_type = point
        .payload
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Some(RawHit {
        source_id,
        name,
        text,
        chunk_type,
        raw_score: point.score,
        weighted_score: point.score * search.weight,
        collection: search.collection,
        metadata: safe_metadata(&point.payload),
    })
}

fn safe_metadata(payload: &Payload) -> Payload {
    SAFE_METADATA_FIELDS
        .iter()
        .filter_map(|&field| {
            let value = payload.get(field)?;
            let allowed = value.is_string() || value.is_number() || value.is_array();
            allowed.then(|| (field.to_string(), value.clone()))
        })
        .collect()
}
