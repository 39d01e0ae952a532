//! Embedding Provider: maps text to a fixed-dimension dense vector.
//!
//! The search core only sees the `EmbeddingProvider` trait. `HttpEmbeddingProvider`
//! speaks the OpenAI-compatible `/v1/embeddings` wire format.

use async_trait::async_trait;
use thiserror::Error;

pub mod http;

pub use http::HttpEmbeddingProvider;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("expected {expected}-dimensional vector, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("provider returned {returned} vectors for {requested} inputs")]
    Count { requested: usize, returned: usize },

    #[error("cannot embed empty text")]
    EmptyInput,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds several texts, preserving order.
    ///
    /// The default calls `embed` sequentially; backends with native batching override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Dimensionality of every vector this provider returns.
    fn dimensions(&self) -> usize;
}

/// Rejects vectors whose length does not match the configured dimension.
pub fn check_dimensions(vector: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(EmbeddingError::Dimension {
            expected,
            actual: vector.len(),
        })
    }
}
