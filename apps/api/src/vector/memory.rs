//! In-memory vector store using cosine similarity.
//!
//! Points live in a `HashMap` of collections guarded by a `tokio::sync::RwLock`.
//! Suitable for local development and tests; nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::vector::{
    CollectionInfo, Distance, FieldMatch, ScoredPoint, StoredPoint, VectorPoint, VectorStore,
    VectorStoreError,
};

#[derive(Debug)]
struct MemoryCollection {
    dimensions: usize,
    /// Insertion order is kept so equal scores come back deterministically.
    points: Vec<VectorPoint>,
}

#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    // Rounding can push identical vectors just past 1.0.
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

fn missing(name: &str) -> VectorStoreError {
    VectorStoreError::MissingCollection(name.to_string())
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        _distance: Distance,
    ) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| MemoryCollection {
                dimensions,
                points: Vec::new(),
            });
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, VectorStoreError> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| missing(name))?;
        Ok(CollectionInfo {
            name: name.to_string(),
            points_count: collection.points.len() as u64,
        })
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != target.dimensions) {
            return Err(VectorStoreError::Dimension {
                collection: collection.to_string(),
                expected: target.dimensions,
                actual: bad.vector.len(),
            });
        }

        for point in points {
            match target.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point,
                None => target.points.push(point),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let collections = self.collections.read().await;
        let source = collections.get(collection).ok_or_else(|| missing(collection))?;

        let mut scored: Vec<ScoredPoint> = source
            .points
            .iter()
            .map(|point| ScoredPoint {
                id: point.id.to_string(),
                score: cosine_similarity(&point.vector, vector),
                payload: point.payload.clone(),
            })
            .filter(|hit| score_threshold.map_or(true, |t| hit.score >= t))
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn delete(&self, collection: &str, filter: &FieldMatch) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        target.points.retain(|p| !filter.matches(&p.payload));
        Ok(())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &FieldMatch,
    ) -> Result<Vec<StoredPoint>, VectorStoreError> {
        let collections = self.collections.read().await;
        let source = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(source
            .points
            .iter()
            .filter(|p| filter.matches(&p.payload))
            .map(|p| StoredPoint {
                id: p.id.to_string(),
                payload: p.payload.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceRef;
    use crate::vector::Payload;
    use serde_json::json;
    use uuid::Uuid;

    fn point(resume_id: i64, vector: Vec<f32>) -> VectorPoint {
        let mut payload = Payload::new();
        payload.insert("resume_id".to_string(), json!(resume_id));
        payload.insert("text".to_string(), json!("chunk"));
        VectorPoint {
            id: Uuid::new_v4(),
            vector,
            payload,
        }
    }

    async fn store_with_collection() -> MemoryVectorStore {
        let store = MemoryVectorStore::new();
        store
            .create_collection("c", 2, Distance::Cosine)
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_cosine_similarity_orthogonal_and_identical() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_applies_threshold_and_limit() {
        let store = store_with_collection().await;
        store
            .upsert(
                "c",
                vec![
                    point(1, vec![1.0, 0.0]),
                    point(2, vec![0.7, 0.7]),
                    point(3, vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("c", &[1.0, 0.0], 10, Some(0.5)).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);

        let limited = store.search("c", &[1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_scroll_by_filter() {
        let store = store_with_collection().await;
        store
            .upsert(
                "c",
                vec![point(1, vec![1.0, 0.0]), point(1, vec![0.0, 1.0]), point(2, vec![1.0, 1.0])],
            )
            .await
            .unwrap();

        let filter = FieldMatch::source(SourceRef::resume(1));
        assert_eq!(store.scroll("c", &filter).await.unwrap().len(), 2);

        store.delete("c", &filter).await.unwrap();
        assert!(store.scroll("c", &filter).await.unwrap().is_empty());
        assert_eq!(store.collection_info("c").await.unwrap().points_count, 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let store = store_with_collection().await;
        let err = store
            .upsert("c", vec![point(1, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Dimension { .. }));
    }

    #[tokio::test]
    async fn test_missing_collection_is_an_error() {
        let store = MemoryVectorStore::new();
        let err = store.search("nope", &[1.0], 1, None).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::MissingCollection(_)));
    }
}
