//! signal-memory - self-improving decision memory
//!
//! Records trading decisions with vector embeddings, retrieves similar past
//! decisions to adjust the confidence of new ones, tracks rolling
//! performance, and emits improvement actions when performance regresses.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the repository/embedding ports
//! - **Adapters** (`adapters`): `SQLite` persistence and embedding providers
//! - **Service Layer** (`services`): signal store, vector index, context
//!   retrieval, confidence adjustment and the improvement scheduler
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): operator commands
//!
//! # Example
//!
//! ```ignore
//! use signal_memory::{CandidateDecision, Config, DecisionMemory, DecisionType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let memory = DecisionMemory::from_config(&Config::default()).await?;
//!     let decision = memory
//!         .process(CandidateDecision::new("BTC", DecisionType::Buy, 0.7, "breakout"))
//!         .await?;
//!     println!("final confidence {:.2}", decision.final_confidence);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::embeddings::{create_provider, HashingEmbeddingProvider, OpenAiEmbeddingProvider};
pub use adapters::sqlite::SqliteSignalRepository;
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    CandidateDecision, Config, DecisionType, EnhancedDecision, HistoricalContext,
    ImprovementAction, ImprovementType, PerformanceSnapshot, SignalOutcome, SignalQuery,
    SignalRecord, SimilarSignal,
};
pub use domain::ports::{EmbeddingProvider, SignalRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ConfidenceAdjuster, ContextRetriever, DecisionMemory, EmbeddingMode, EvaluationOutcome,
    ImprovementDaemonConfig, ImprovementScheduler, SignalStore, VectorIndex,
};
