//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - EmbeddingProvider: text to vector generation
//! - SignalRepository: durable storage for signals and improvement actions

pub mod embedding;
pub mod signal_repository;

pub use embedding::{EmbeddingProvider, SignatureEmbedding, SignatureInput};
pub use signal_repository::SignalRepository;
