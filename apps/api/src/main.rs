mod config;
mod db;
mod embedding;
mod errors;
mod llm_client;
mod models;
mod records;
mod routes;
mod state;
mod talent;
mod vector;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::embedding::{EmbeddingProvider, HttpEmbeddingProvider};
use crate::llm_client::LlmClient;
use crate::records::{PgRecordStore, RecordStore};
use crate::routes::build_router;
use crate::state::AppState;
use crate::talent::conversation::{
    ConversationStore, InMemoryConversationStore, RedisConversationStore,
};
use crate::talent::indexer::IndexMaintainer;
use crate::talent::orchestrator::TalentSearch;
use crate::vector::{MemoryVectorStore, QdrantStore, VectorStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting talent search API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url).await?;
    let records: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(db));

    let store: Arc<dyn VectorStore> = match &config.qdrant_url {
        Some(url) => {
            info!("Vector store: Qdrant at {url}");
            Arc::new(QdrantStore::new(
                url,
                config.qdrant_api_key.clone(),
                config.timeouts.vector_store,
            )?)
        }
        None => {
            warn!("QDRANT_URL not set; using the in-memory vector store (index is lost on restart)");
            Arc::new(MemoryVectorStore::new())
        }
    };

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
        &config.embedding,
        config.timeouts.embedding,
    )?);
    info!(
        "Embedding provider: {} ({} dims)",
        config.embedding.model, config.embedding.dimensions
    );

    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.timeouts.llm)?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let conversations = conversation_store(&config).await?;

    let indexer = Arc::new(IndexMaintainer::new(
        store.clone(),
        embedder.clone(),
        records.clone(),
    ));
    match indexer.ensure_collections().await {
        Ok(created) if !created.is_empty() => info!("Created collections: {created:?}"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "could not verify vector collections; search may be degraded"),
    }

    if config.reindex_on_startup {
        let indexer = indexer.clone();
        tokio::spawn(async move {
            if let Err(e) = indexer.reindex_all().await {
                warn!(error = %e, "startup reindex failed");
            }
        });
    }

    let search = Arc::new(TalentSearch::new(
        Arc::new(llm),
        store,
        embedder,
        records.clone(),
        conversations,
        &config.search,
    ));

    let state = AppState {
        records,
        search,
        indexer,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Redis when `REDIS_URL` is set, otherwise a bounded in-process store.
async fn conversation_store(config: &Config) -> Result<Arc<dyn ConversationStore>> {
    let limits = config.conversations.clone();
    match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            let store = RedisConversationStore::connect(&client, limits).await?;
            info!("Conversation history: Redis");
            Ok(Arc::new(store))
        }
        None => {
            info!("Conversation history: in-memory");
            Ok(Arc::new(InMemoryConversationStore::new(limits)))
        }
    }
}
