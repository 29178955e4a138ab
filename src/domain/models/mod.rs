pub mod config;
pub mod context;
pub mod improvement;
pub mod performance;
pub mod signal;

pub use config::{
    Config, DatabaseConfig, EmbeddingConfig, ImprovementConfig, LoggingConfig, RetentionConfig,
    RetrievalConfig,
};
pub use context::{
    CandidateDecision, ContextEntry, EnhancedDecision, HistoricalContext, SimilarSignal,
};
pub use improvement::{ActionParameters, ImprovementAction, ImprovementType, PerformanceMap};
pub use performance::{window_end, window_start, PerformanceSnapshot};
pub use signal::{
    DecisionType, MarketSnapshot, PerformanceMetrics, SignalOutcome, SignalQuery, SignalRecord,
};
