//! Decision memory facade.
//!
//! The single object a host builds and shares (behind an `Arc`) to record
//! decisions, resolve their outcomes, retrieve historical context and drive
//! the improvement loop.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::context_retriever::ContextRetriever;
use super::improvement_daemon::{DaemonHandle, ImprovementDaemon, ImprovementDaemonConfig, ImprovementDaemonEvent};
use super::improvement_scheduler::{EvaluationOutcome, ImprovementScheduler};
use super::signal_store::{EmbeddingMode, SignalStore, StoreStats, StoredSignal};
use crate::adapters::embeddings::create_provider;
use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig, SqliteSignalRepository};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CandidateDecision, Config, EnhancedDecision, ImprovementAction, PerformanceMetrics,
    PerformanceSnapshot, RetentionConfig, SignalOutcome, SignalQuery, SignalRecord, SimilarSignal,
    window_start,
};
use crate::domain::ports::{EmbeddingProvider, SignalRepository};

/// Entry point tying the signal store, context retrieval and the improvement loop together.
pub struct DecisionMemory<R: SignalRepository + 'static> {
    store: Arc<SignalStore<R>>,
    retriever: ContextRetriever<R>,
    scheduler: Arc<ImprovementScheduler<R>>,
    retention: RetentionConfig,
}

impl DecisionMemory<SqliteSignalRepository> {
    /// Open the SQLite database and embedding provider named by `config`.
    pub async fn from_config(config: &Config) -> DomainResult<Self> {
        let url = database_url(&config.database.path);
        let pool_config = PoolConfig::default().with_max_connections(config.database.max_connections);
        let pool = initialize_database(&url, Some(pool_config))
            .await
            .map_err(|e| DomainError::StorageError(e.to_string()))?;

        let repository = Arc::new(SqliteSignalRepository::new(pool));
        let embedder = create_provider(&config.embedding)?;
        Self::open(repository, embedder, config).await
    }
}

impl<R: SignalRepository + 'static> DecisionMemory<R> {
    /// Load the store from `repository` and wire up retrieval and scheduling.
    pub async fn open(
        repository: Arc<R>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &Config,
    ) -> DomainResult<Self> {
        let store = Arc::new(SignalStore::open(repository, embedder).await?);
        let retriever = ContextRetriever::new(store.clone()).with_config(config.retrieval.clone());
        let scheduler = Arc::new(ImprovementScheduler::new(store.clone(), config.improvement.clone()));

        Ok(Self {
            store,
            retriever,
            scheduler,
            retention: config.retention.clone(),
        })
    }

    /// The underlying signal store.
    pub fn signal_store(&self) -> &Arc<SignalStore<R>> {
        &self.store
    }

    /// The improvement scheduler.
    pub fn scheduler(&self) -> &Arc<ImprovementScheduler<R>> {
        &self.scheduler
    }

    /// Configured retention policy.
    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    /// Enrich a candidate decision with historical context and record it.
    pub async fn process(&self, candidate: CandidateDecision) -> DomainResult<EnhancedDecision> {
        self.retriever.process(candidate).await
    }

    /// Store a record, requiring an embedding.
    pub async fn store(&self, record: SignalRecord) -> DomainResult<StoredSignal> {
        self.store.store(record).await
    }

    /// Store a record with an explicit embedding policy.
    pub async fn store_with_mode(&self, record: SignalRecord, mode: EmbeddingMode) -> DomainResult<StoredSignal> {
        self.store.store_with_mode(record, mode).await
    }

    /// Resolve a signal, then give the improvement scheduler a chance to run.
    pub async fn update_outcome(
        &self,
        id: &str,
        outcome: SignalOutcome,
        metrics: Option<PerformanceMetrics>,
    ) -> DomainResult<()> {
        self.store.update_outcome(id, outcome, metrics).await?;
        self.scheduler.on_outcome_updated().await;
        Ok(())
    }

    /// Up to `k` stored signals most similar to `query`.
    pub async fn find_similar(&self, query: &SignalQuery, k: usize) -> DomainResult<Vec<SimilarSignal>> {
        self.store.find_similar(query, k).await
    }

    /// Performance over the last `window_days` days.
    pub async fn metrics(&self, window_days: i64) -> PerformanceSnapshot {
        self.store.metrics(window_days).await
    }

    /// Run an improvement evaluation now, ignoring the interval guard.
    pub async fn trigger_improvement(&self) -> DomainResult<EvaluationOutcome> {
        self.scheduler.trigger().await
    }

    /// Counts and index state.
    pub async fn stats(&self) -> StoreStats {
        self.store.stats().await
    }

    /// Delete records older than `cutoff` and rebuild the index.
    pub async fn cleanup(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let removed = self.store.cleanup(cutoff).await?;
        self.store.rebuild_index().await?;
        Ok(removed)
    }

    /// Apply the configured retention, if any. Returns the number removed.
    pub async fn apply_retention(&self, now: DateTime<Utc>) -> DomainResult<Option<usize>> {
        match self.retention.max_age_days {
            Some(days) => self.cleanup(window_start(now, days)).await.map(Some),
            None => Ok(None),
        }
    }

    /// Rebuild the index from every embedded record.
    pub async fn rebuild_index(&self) -> DomainResult<usize> {
        self.store.rebuild_index().await
    }

    /// Embed records stored without an embedding and rebuild the index.
    pub async fn backfill_embeddings(&self) -> DomainResult<usize> {
        let filled = self.store.backfill_embeddings().await?;
        self.store.rebuild_index().await?;
        Ok(filled)
    }

    /// Fill `performance_after` on every action whose window has elapsed.
    pub async fn reconcile_improvements(&self) -> DomainResult<usize> {
        self.scheduler.reconcile(Utc::now()).await
    }

    /// All improvement actions in emission order.
    pub async fn improvements(&self) -> Vec<ImprovementAction> {
        self.store.improvements().await
    }

    /// Start the background improvement daemon.
    ///
    /// While it runs, outcome updates wake the daemon instead of evaluating
    /// inline.
    pub fn spawn_improvement_daemon(
        &self,
        config: ImprovementDaemonConfig,
    ) -> (DaemonHandle, mpsc::Receiver<ImprovementDaemonEvent>) {
        let daemon = ImprovementDaemon::new(self.scheduler.clone(), config);
        let handle = daemon.handle();
        let events = daemon.run();
        (handle, events)
    }
}
