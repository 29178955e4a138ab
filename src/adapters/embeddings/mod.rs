//! Embedding provider adapters.

pub mod hashing;
pub mod openai;

pub use hashing::HashingEmbeddingProvider;
pub use openai::{OpenAiEmbeddingConfig, OpenAiEmbeddingProvider};

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::EmbeddingConfig;
use crate::domain::ports::EmbeddingProvider;

/// Build the provider selected by `embedding.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> DomainResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.to_lowercase().as_str() {
        "hashing" => Ok(Arc::new(HashingEmbeddingProvider::new(config.dimension))),
        "openai" => Ok(Arc::new(OpenAiEmbeddingProvider::new(
            OpenAiEmbeddingConfig::from(config),
        )?)),
        other => Err(DomainError::ConfigurationError(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}
