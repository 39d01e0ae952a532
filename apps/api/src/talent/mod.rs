//! Retrieval-augmented talent search.
//!
//! Indexing: record → `chunker` → embeddings → per-kind collections (`indexer`).
//! Search: `requirements` → `retriever` → `aggregator` → `rehydrator` → `summary`,
//! composed by `orchestrator`.

pub mod aggregator;
pub mod chunker;
pub mod conversation;
pub mod handlers;
pub mod indexer;
pub mod orchestrator;
pub mod prompts;
pub mod rehydrator;
pub mod requirements;
pub mod retriever;
pub mod summary;

#[cfg(test)]
pub mod testing;
