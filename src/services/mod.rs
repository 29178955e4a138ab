pub mod confidence_adjuster;
pub mod context_retriever;
pub mod decision_memory;
pub mod improvement_daemon;
pub mod improvement_scheduler;
pub mod signal_store;
pub mod vector_index;

pub use confidence_adjuster::ConfidenceAdjuster;
pub use context_retriever::ContextRetriever;
pub use decision_memory::DecisionMemory;
pub use improvement_daemon::{
    DaemonHandle, DaemonStatus, ImprovementDaemon, ImprovementDaemonConfig, ImprovementDaemonEvent,
    RunTrigger,
};
pub use improvement_scheduler::{EvaluationOutcome, ImprovementScheduler, NoActionReason};
pub use signal_store::{EmbeddingMode, SignalStore, StoreStats, StoredSignal};
pub use vector_index::VectorIndex;
