//! Qdrant backend over the REST API.
//!
//! Collections use cosine distance; writes are sent with `wait=true` so a
//! delete followed by an upsert is observed in that order.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::vector::{
    CollectionInfo, Distance, FieldMatch, Payload, ScoredPoint, StoredPoint, VectorPoint,
    VectorStore, VectorStoreError,
};

const SCROLL_PAGE_SIZE: usize = 256;

#[derive(Clone)]
pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Every Qdrant REST response wraps its body in `result`.
#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    status: ErrorStatus,
}

#[derive(Deserialize)]
struct ErrorStatus {
    error: String,
}

#[derive(Deserialize)]
struct CollectionsList {
    collections: Vec<CollectionName>,
}

#[derive(Deserialize)]
struct CollectionName {
    name: String,
}

#[derive(Deserialize)]
struct CollectionDetails {
    #[serde(default)]
    points_count: Option<u64>,
}

#[derive(Deserialize)]
struct QdrantScored {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Deserialize)]
struct ScrollPage {
    points: Vec<QdrantRecord>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
struct QdrantRecord {
    id: Value,
    #[serde(default)]
    payload: Option<Payload>,
}

impl QdrantStore {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VectorStoreError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, VectorStoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.status.error)
                .unwrap_or(body);
            return Err(VectorStoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| VectorStoreError::Decode(e.to_string()))?;
        Ok(envelope.result)
    }
}

fn filter_body(filter: &FieldMatch) -> Value {
    json!({
        "must": [
            { "key": filter.key, "match": { "value": filter.value } }
        ]
    })
}

fn point_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        let list: CollectionsList = self.send(self.request(Method::GET, "/collections")).await?;
        Ok(list.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<(), VectorStoreError> {
        let distance = match distance {
            Distance::Cosine => "Cosine",
        };
        let _: Value = self
            .send(
                self.request(Method::PUT, &format!("/collections/{name}"))
                    .json(&json!({ "vectors": { "size": dimensions, "distance": distance } })),
            )
            .await?;
        debug!(collection = name, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, VectorStoreError> {
        let details: CollectionDetails = self
            .send(self.request(Method::GET, &format!("/collections/{name}")))
            .await?;
        Ok(CollectionInfo {
            name: name.to_string(),
            points_count: details.points_count.unwrap_or(0),
        })
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }
        let count = points.len();
        let body: Vec<Value> = points
            .into_iter()
            .map(|p| json!({ "id": p.id.to_string(), "vector": p.vector, "payload": p.payload }))
            .collect();

        let _: Value = self
            .send(
                self.request(Method::PUT, &format!("/collections/{collection}/points?wait=true"))
                    .json(&json!({ "points": body })),
            )
            .await?;
        debug!(collection, count, "upserted points to qdrant");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(threshold) = score_threshold {
            body["score_threshold"] = json!(threshold);
        }

        let hits: Vec<QdrantScored> = self
            .send(
                self.request(Method::POST, &format!("/collections/{collection}/points/search"))
                    .json(&body),
            )
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| ScoredPoint {
                id: point_id(&hit.id),
                score: hit.score,
                payload: hit.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete(&self, collection: &str, filter: &FieldMatch) -> Result<(), VectorStoreError> {
        let _: Value = self
            .send(
                self.request(
                    Method::POST,
                    &format!("/collections/{collection}/points/delete?wait=true"),
                )
                .json(&json!({ "filter": filter_body(filter) })),
            )
            .await?;
        debug!(collection, key = filter.key, value = filter.value, "deleted points by filter");
        Ok(())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &FieldMatch,
    ) -> Result<Vec<StoredPoint>, VectorStoreError> {
        let mut points = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "filter": filter_body(filter),
                "limit": SCROLL_PAGE_SIZE,
                "with_payload": true,
                "with_vector": false,
            });
            if let Some(next) = &offset {
                body["offset"] = next.clone();
            }

            let page: ScrollPage = self
                .send(
                    self.request(Method::POST, &format!("/collections/{collection}/points/scroll"))
                        .json(&body),
                )
                .await?;

            points.extend(page.points.into_iter().map(|record| StoredPoint {
                id: point_id(&record.id),
                payload: record.payload.unwrap_or_default(),
            }));

            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceRef;

    #[test]
    fn test_filter_body_shape() {
        let body = filter_body(&FieldMatch::source(SourceRef::resume(12)));
        assert_eq!(body["must"][0]["key"], "resume_id");
        assert_eq!(body["must"][0]["match"]["value"], 12);
    }

    #[test]
    fn test_point_id_accepts_uuid_and_numeric_ids() {
        assert_eq!(point_id(&json!("6f1c")), "6f1c");
        assert_eq!(point_id(&json!(17)), "17");
    }

    #[test]
    fn test_scroll_page_tolerates_missing_offset() {
        let page: ScrollPage =
            serde_json::from_value(json!({ "points": [{ "id": 1, "payload": { "text": "x" } }] }))
                .unwrap();
        assert_eq!(page.points.len(), 1);
        assert!(page.next_page_offset.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let store = QdrantStore::new("http://localhost:6333/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(store.base_url, "http://localhost:6333");
    }
}
