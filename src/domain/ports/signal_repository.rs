use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ImprovementAction, PerformanceMap, PerformanceMetrics, SignalOutcome, SignalRecord,
};

/// Durable storage for signals and improvement actions
///
/// The repository is the system of record. The in-memory collection and
/// vector index held by the signal store are projections rebuilt from it.
#[async_trait]
pub trait SignalRepository: Send + Sync {
    /// Insert a signal, replacing any existing row with the same id
    async fn upsert_signal(&self, signal: &SignalRecord) -> DomainResult<()>;

    /// Load every signal ordered by timestamp, then id
    async fn list_signals(&self) -> DomainResult<Vec<SignalRecord>>;

    /// Delete signals with a timestamp strictly before `cutoff`
    ///
    /// Returns the number of rows removed.
    async fn delete_signals_before(&self, cutoff: DateTime<Utc>) -> DomainResult<u64>;

    /// Replace outcome and performance metrics of an existing signal
    ///
    /// # Errors
    /// Returns `SignalNotFound` if no row has the given id.
    async fn update_outcome(
        &self,
        id: &str,
        outcome: SignalOutcome,
        metrics: Option<&PerformanceMetrics>,
    ) -> DomainResult<()>;

    /// Attach an embedding to a signal stored without one
    async fn update_embedding(&self, id: &str, embedding: &[f32]) -> DomainResult<()>;

    /// Insert an improvement action, replacing any existing row with the same id
    async fn upsert_improvement(&self, action: &ImprovementAction) -> DomainResult<()>;

    /// Load every improvement action ordered by timestamp, then insertion
    async fn list_improvements(&self) -> DomainResult<Vec<ImprovementAction>>;

    /// Record the measured effect of an improvement action
    ///
    /// # Errors
    /// Returns `ImprovementNotFound` if no row has the given id.
    async fn update_performance_after(
        &self,
        id: &str,
        performance_after: &PerformanceMap,
    ) -> DomainResult<()>;
}
