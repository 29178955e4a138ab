//! Adapters for external systems.

pub mod embeddings;
pub mod sqlite;
