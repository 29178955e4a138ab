//! Embedding provider port for signal signatures.
//!
//! A provider turns the text signature of a signal (symbol, decision and
//! reasoning) into a dense vector for similarity search.

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::SignalRecord;

/// A signal signature waiting for an embedding.
#[derive(Debug, Clone)]
pub struct SignatureInput {
    /// Signal the signature belongs to
    pub signal_id: String,
    /// Text to embed
    pub signature: String,
}

impl From<&SignalRecord> for SignatureInput {
    fn from(record: &SignalRecord) -> Self {
        Self {
            signal_id: record.id.clone(),
            signature: record.signature(),
        }
    }
}

/// The embedding computed for one signature.
#[derive(Debug, Clone)]
pub struct SignatureEmbedding {
    /// Signal id of the matching input.
    pub signal_id: String,
    /// The embedding vector
    pub vector: Vec<f32>,
}

/// Source of signature embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g., "openai", "hashing").
    fn name(&self) -> &'static str;

    /// Embedding dimension for this provider/model.
    fn dimension(&self) -> usize;

    /// Embed a single signature or query text.
    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>>;

    /// Embed many signatures at once.
    ///
    /// Implementations chunk by `max_batch_size` and return outputs in input order.
    async fn embed_signatures(&self, inputs: &[SignatureInput]) -> DomainResult<Vec<SignatureEmbedding>>;

    /// Maximum number of texts per single call.
    fn max_batch_size(&self) -> usize;

    /// Reject vectors that cannot be stored: empty or holding non-finite values.
    fn check_vector(&self, vector: &[f32]) -> DomainResult<()> {
        if vector.is_empty() {
            return Err(DomainError::EmbeddingError(format!(
                "Provider '{}' returned an empty vector",
                self.name()
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(DomainError::EmbeddingError(format!(
                "Provider '{}' returned a non-finite value",
                self.name()
            )));
        }
        Ok(())
    }
}
