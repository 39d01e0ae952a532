pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::talent::handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/talent/search", post(handlers::handle_search))
        .route("/api/v1/talent/status", get(handlers::handle_status))
        .route("/api/v1/talent/events", post(handlers::handle_event))
        .route("/api/v1/talent/sync", post(handlers::handle_sync_all))
        .route(
            "/api/v1/talent/sync/resumes/:id",
            post(handlers::handle_sync_resume).delete(handlers::handle_remove_resume),
        )
        .route(
            "/api/v1/talent/sync/jobs/:id",
            post(handlers::handle_sync_job).delete(handlers::handle_remove_job),
        )
        .route(
            "/api/v1/talent/index/resumes/:id",
            get(handlers::handle_resume_chunks),
        )
        .route(
            "/api/v1/talent/index/jobs/:id",
            get(handlers::handle_job_chunks),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::{Config, ConversationLimits};
    use crate::talent::conversation::InMemoryConversationStore;
    use crate::talent::indexer::IndexMaintainer;
    use crate::talent::orchestrator::TalentSearch;
    use crate::talent::testing::{
        job_record, resume_record, HashEmbedder, InMemoryRecordStore, ScriptedLlm,
    };
    use crate::vector::MemoryVectorStore;

    async fn app_with(llm: ScriptedLlm, search_timeout: Duration) -> Router {
        let mut config = Config::for_tests();
        config.timeouts.search = search_timeout;

        let records = Arc::new(
            InMemoryRecordStore::default()
                .with_resume(resume_record(
                    1,
                    "Alice Python",
                    &["Python", "FastAPI"],
                    json!([{"title": "Backend developer", "company": "Snakes Ltd"}]),
                    json!([]),
                ))
                .with_job(job_record(4, "Python developer", &["Python"])),
        );
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::default());
        let indexer = Arc::new(IndexMaintainer::new(
            store.clone(),
            embedder.clone(),
            records.clone(),
        ));
        indexer.ensure_collections().await.unwrap();

        let search = Arc::new(TalentSearch::new(
            Arc::new(llm),
            store,
            embedder,
            records.clone(),
            Arc::new(InMemoryConversationStore::new(ConversationLimits::default())),
            &config.search,
        ));

        build_router(AppState {
            records,
            search,
            indexer,
            config,
        })
    }

    async fn app() -> Router {
        app_with(ScriptedLlm::failing(), Duration::from_secs(5)).await
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app().await, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "talent-search-api");
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let (status, body) = send(
            &app().await,
            "POST",
            "/api/v1/talent/search",
            Some(json!({"query": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Query is required");
    }

    #[tokio::test]
    async fn test_sync_search_and_inspect() {
        let app = app().await;

        let (status, report) = send(&app, "POST", "/api/v1/talent/sync", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["success_count"], 2);
        assert_eq!(report["failure_count"], 0);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/talent/search",
            Some(json!({"query": "Python backend developer", "conversation_id": "c-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_found"], 1);
        assert_eq!(body["candidates"][0]["source_id"], 1);
        assert_eq!(body["candidates"][0]["email"], "candidate1@example.com");
        assert_eq!(body["requirements_extracted"]["fallback_search"], true);
        assert_eq!(body["candidate_cards"][0]["name"], "Alice Python");

        let (status, chunks) = send(&app, "GET", "/api/v1/talent/index/jobs/4", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(chunks["total"], 2);

        let (status, status_body) = send(&app, "GET", "/api/v1/talent/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(status_body["records"]["resumes"], 1);
        assert_eq!(status_body["indexing"]["indexed"], 2);
        assert_eq!(status_body["collections"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_single_record_sync_and_remove() {
        let app = app().await;

        let (status, outcome) = send(&app, "POST", "/api/v1/talent/sync/resumes/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["points_indexed"], 3);

        let (status, _) = send(&app, "DELETE", "/api/v1/talent/sync/resumes/1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, chunks) = send(&app, "GET", "/api/v1/talent/index/resumes/1", None).await;
        assert_eq!(chunks["total"], 0);

        let (status, body) = send(&app, "POST", "/api/v1/talent/sync/jobs/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_event_is_accepted_and_applied_in_background() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/talent/events",
            Some(json!({"action": "created", "kind": "resume", "id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["accepted"], true);

        let mut total = 0;
        for _ in 0..50 {
            let (_, chunks) = send(&app, "GET", "/api/v1/talent/index/resumes/1", None).await;
            total = chunks["total"].as_u64().unwrap_or_default();
            if total > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_search_timeout_maps_to_gateway_timeout() {
        let slow = ScriptedLlm::failing().delayed(Duration::from_secs(30));
        let app = app_with(slow, Duration::from_millis(50)).await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/talent/search",
            Some(json!({"query": "Python"})),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["code"], "TIMEOUT");
    }
}
