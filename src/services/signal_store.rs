//! Signal store: durable records plus their in-memory projection.
//!
//! The repository is the system of record. The store keeps every signal and
//! improvement action in memory, in load/insertion order, together with the
//! vector index derived from the embedded signals. All of it sits behind one
//! `RwLock`: mutations hold the write lock across the durable write and the
//! memory update, reads take the read lock. Embedding calls are made before
//! the lock is taken.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::vector_index::VectorIndex;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ImprovementAction, PerformanceMap, PerformanceMetrics, PerformanceSnapshot, SignalOutcome,
    SignalQuery, SignalRecord, SimilarSignal,
};
use crate::domain::ports::{EmbeddingProvider, SignalRepository, SignatureInput};

/// What to do when the embedding provider fails during `store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingMode {
    /// Fail the call; nothing is persisted.
    #[default]
    Required,
    /// Persist without an embedding; the record stays out of the index
    /// until a later backfill.
    AllowUnindexed,
}

/// Result of a successful `store`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredSignal {
    /// Id of the stored record
    pub id: String,
    /// Whether the record takes part in similarity search
    pub indexed: bool,
    /// Whether an existing record with the same id was replaced
    pub replaced: bool,
}

/// Point-in-time view of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    /// Signals held in memory
    pub total_signals: usize,
    /// Signals carrying an embedding
    pub embedded_signals: usize,
    /// Recorded improvement actions
    pub improvements: usize,
    /// Vectors currently in the index
    pub index_size: usize,
    /// Dimension the index is locked to, if any
    pub index_dimension: Option<usize>,
    /// Last full rebuild or incremental add
    pub last_index_update: Option<DateTime<Utc>>,
    /// Name of the embedding provider
    pub embedding_provider: String,
}

#[derive(Default)]
struct StoreState {
    records: Vec<SignalRecord>,
    positions: HashMap<String, usize>,
    index: VectorIndex,
    /// Set when records changed without the index following them
    stale: bool,
    improvements: Vec<ImprovementAction>,
    last_index_update: Option<DateTime<Utc>>,
}

impl StoreState {
    fn embedded_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_indexable()).count()
    }

    /// Dimension of the first stored embedding, in load order.
    fn stored_dimension(&self) -> Option<usize> {
        self.records
            .iter()
            .find_map(|r| r.embedding.as_ref().filter(|e| !e.is_empty()).map(Vec::len))
    }

    /// Dimension new embeddings must have to join the index.
    fn expected_dimension(&self) -> Option<usize> {
        if self.stale {
            self.stored_dimension()
        } else {
            self.index.dimension()
        }
    }

    fn reindex_positions(&mut self) {
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.id.clone(), pos))
            .collect();
    }

    /// Rebuild the index from every embedded record of the stored dimension.
    ///
    /// Embeddings of any other dimension (left by an earlier provider) stay
    /// out of the index.
    fn rebuild_index(&mut self) -> DomainResult<usize> {
        let dimension = self.stored_dimension();
        let mut skipped = 0usize;
        let entries: Vec<(String, Vec<f32>)> = self
            .records
            .iter()
            .filter_map(|r| {
                let embedding = r.embedding.as_ref().filter(|e| !e.is_empty())?;
                if Some(embedding.len()) != dimension {
                    skipped += 1;
                    return None;
                }
                Some((r.id.clone(), embedding.clone()))
            })
            .collect();
        if skipped > 0 {
            tracing::warn!(
                skipped,
                dimension = ?dimension,
                "Leaving signals with a different embedding dimension out of the index"
            );
        }

        let result = self.index.rebuild(entries);
        self.last_index_update = Some(Utc::now());
        self.stale = result.is_err();
        result.map(|()| self.index.len())
    }

    fn refresh_index(&mut self) -> DomainResult<()> {
        if self.stale {
            let size = self.rebuild_index()?;
            tracing::warn!(size, "Vector index diverged from store; rebuilt");
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Option<&SignalRecord> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut SignalRecord> {
        match self.positions.get(id) {
            Some(&pos) => self.records.get_mut(pos),
            None => None,
        }
    }
}

/// Durable signal storage with an in-memory projection and similarity index.
pub struct SignalStore<R: SignalRepository> {
    repository: Arc<R>,
    embedder: Arc<dyn EmbeddingProvider>,
    state: RwLock<StoreState>,
}

impl<R: SignalRepository> SignalStore<R> {
    /// Load every signal and improvement action from the repository,
    /// backfill missing embeddings and build the index.
    ///
    /// A provider outage during backfill is logged and leaves the affected
    /// records unindexed. Backfilled vectors must match the dimension of the
    /// embeddings already stored; a failed rebuild is logged and retried
    /// before the next search.
    pub async fn open(repository: Arc<R>, embedder: Arc<dyn EmbeddingProvider>) -> DomainResult<Self> {
        let records = repository.list_signals().await?;
        let improvements = repository.list_improvements().await?;

        let mut state = StoreState {
            records,
            improvements,
            stale: true,
            ..Default::default()
        };
        state.reindex_positions();

        let store = Self {
            repository,
            embedder,
            state: RwLock::new(state),
        };

        match store.backfill_embeddings().await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Backfilled signal embeddings"),
            Err(err) => tracing::warn!(error = %err, "Embedding backfill failed; records stay unindexed"),
        }

        let indexed = match store.rebuild_index().await {
            Ok(size) => size,
            Err(err) => {
                tracing::warn!(error = %err, "Index rebuild failed; signals stay unsearchable until repaired");
                0
            }
        };
        tracing::info!(
            signals = store.len().await,
            indexed,
            provider = store.embedder.name(),
            "Signal store opened"
        );

        Ok(store)
    }

    /// Underlying durable repository.
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Provider used for signatures and queries.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Embed text with the configured provider.
    pub async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        let vector = self.embedder.embed(text).await?;
        self.embedder.check_vector(&vector)?;
        Ok(vector)
    }

    /// Store a record, requiring an embedding.
    pub async fn store(&self, record: SignalRecord) -> DomainResult<StoredSignal> {
        self.store_with_mode(record, EmbeddingMode::Required).await
    }

    /// Validate, embed if needed, persist, then update memory and the index.
    ///
    /// A record whose id already exists replaces the old one and forces a
    /// full index rebuild.
    pub async fn store_with_mode(
        &self,
        mut record: SignalRecord,
        mode: EmbeddingMode,
    ) -> DomainResult<StoredSignal> {
        record.validate().map_err(DomainError::ValidationFailed)?;
        record.timestamp = record.timestamp.trunc_subsecs(6);

        if record.embedding.is_none() {
            match self.embed(&record.signature()).await {
                Ok(vector) => record.embedding = Some(vector),
                Err(err) if mode == EmbeddingMode::AllowUnindexed && err.is_retryable() => {
                    tracing::warn!(
                        signal_id = %record.id,
                        error = %err,
                        "Embedding failed; storing signal unindexed"
                    );
                }
                Err(err) => return Err(err),
            }
            record.validate().map_err(DomainError::ValidationFailed)?;
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.refresh_index()?;

        if let Some(embedding) = &record.embedding {
            state.index.check_dimension(embedding)?;
        }

        self.repository.upsert_signal(&record).await?;

        let id = record.id.clone();
        let indexed = record.is_indexable();
        let replaced = match state.positions.get(&id).copied() {
            Some(pos) => {
                state.records[pos] = record;
                true
            }
            None => {
                let embedding = record.embedding.clone();
                let pos = state.records.len();
                state.positions.insert(id.clone(), pos);
                state.records.push(record);
                if let Some(vector) = embedding.filter(|_| indexed) {
                    state.index.add(id.clone(), vector)?;
                    state.last_index_update = Some(Utc::now());
                }
                false
            }
        };

        if replaced {
            state.rebuild_index()?;
            tracing::debug!(signal_id = %id, "Replaced existing signal; index rebuilt");
        }

        tracing::debug!(signal_id = %id, indexed, "Stored signal");
        Ok(StoredSignal { id, indexed, replaced })
    }

    /// Set the outcome and performance metrics of a stored signal.
    ///
    /// Both are replaced; the last write wins.
    pub async fn update_outcome(
        &self,
        id: &str,
        outcome: SignalOutcome,
        metrics: Option<PerformanceMetrics>,
    ) -> DomainResult<()> {
        if let Some((key, _)) = metrics
            .as_ref()
            .and_then(|m| m.iter().find(|(_, v)| !v.is_finite()))
        {
            return Err(DomainError::ValidationFailed(format!(
                "Performance metric '{}' is not finite",
                key
            )));
        }

        let mut state = self.state.write().await;
        if state.get(id).is_none() {
            return Err(DomainError::SignalNotFound(id.to_string()));
        }

        self.repository.update_outcome(id, outcome, metrics.as_ref()).await?;

        if let Some(record) = state.get_mut(id) {
            record.outcome = outcome;
            record.performance_metrics = metrics;
        }

        tracing::info!(signal_id = %id, outcome = %outcome, "Updated signal outcome");
        Ok(())
    }

    /// Remove every record with a timestamp strictly before `cutoff`.
    ///
    /// The index is left as is and marked stale; callers rebuild it
    /// afterwards, otherwise the next search does.
    pub async fn cleanup(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let cutoff = cutoff.trunc_subsecs(6);
        let mut state = self.state.write().await;

        let deleted = self.repository.delete_signals_before(cutoff).await?;

        let before = state.records.len();
        state.records.retain(|r| r.timestamp >= cutoff);
        state.reindex_positions();
        let removed = before - state.records.len();
        if removed > 0 {
            state.stale = true;
        }

        if removed as u64 != deleted {
            tracing::warn!(removed, deleted, "Cleanup removed a different number of rows than records");
        }
        tracing::info!(removed, cutoff = %cutoff, "Cleaned up old signals");
        Ok(removed)
    }

    /// Rebuild the index from every embedded record. Returns the index size.
    pub async fn rebuild_index(&self) -> DomainResult<usize> {
        let mut state = self.state.write().await;
        let size = state.rebuild_index()?;
        tracing::info!(size, "Rebuilt vector index");
        Ok(size)
    }

    /// Embed and persist every record stored without an embedding.
    ///
    /// Returns the number of records that received one. Vectors whose
    /// dimension differs from the stored embeddings are skipped. The index
    /// is marked stale; callers rebuild it afterwards, otherwise the next
    /// search does.
    pub async fn backfill_embeddings(&self) -> DomainResult<usize> {
        let inputs: Vec<SignatureInput> = {
            let state = self.state.read().await;
            state
                .records
                .iter()
                .filter(|r| r.embedding.is_none())
                .map(SignatureInput::from)
                .collect()
        };

        if inputs.is_empty() {
            return Ok(0);
        }

        let outputs = self.embedder.embed_signatures(&inputs).await?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mut expected = state.expected_dimension();
        let mut filled = 0;
        for output in outputs {
            if let Err(err) = self.embedder.check_vector(&output.vector) {
                tracing::warn!(signal_id = %output.signal_id, error = %err, "Skipping unusable backfilled embedding");
                continue;
            }
            if let Some(dimension) = expected.filter(|&d| d != output.vector.len()) {
                tracing::warn!(
                    signal_id = %output.signal_id,
                    expected = dimension,
                    actual = output.vector.len(),
                    "Skipping backfilled embedding with wrong dimension"
                );
                continue;
            }
            let pending = state.get(&output.signal_id).is_some_and(|r| r.embedding.is_none());
            if !pending {
                continue;
            }

            self.repository.update_embedding(&output.signal_id, &output.vector).await?;
            expected.get_or_insert(output.vector.len());
            if let Some(record) = state.get_mut(&output.signal_id) {
                record.embedding = Some(output.vector);
                state.stale = true;
                filled += 1;
            }
        }

        Ok(filled)
    }

    /// Rebuild the index if records changed since it was last built.
    async fn ensure_index_consistent(&self) -> DomainResult<()> {
        if !self.state.read().await.stale {
            return Ok(());
        }
        self.state.write().await.refresh_index()
    }

    /// Up to `k` stored signals most similar to the given embedding.
    pub async fn search(&self, embedding: &[f32], k: usize) -> DomainResult<Vec<SimilarSignal>> {
        self.ensure_index_consistent().await?;

        let state = self.state.read().await;
        let hits = state.index.search(embedding, k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(id, similarity)| {
                state.get(&id).map(|signal| SimilarSignal {
                    signal: signal.clone(),
                    similarity,
                })
            })
            .collect())
    }

    /// Embed the query signature and search for similar signals.
    pub async fn find_similar(&self, query: &SignalQuery, k: usize) -> DomainResult<Vec<SimilarSignal>> {
        let embedding = self.embed(&query.signature()).await?;
        self.search(&embedding, k).await
    }

    /// Performance over the last `window_days` days.
    pub async fn metrics(&self, window_days: i64) -> PerformanceSnapshot {
        self.metrics_at(window_days, Utc::now()).await
    }

    /// Performance over the `window_days` days ending at `now`.
    pub async fn metrics_at(&self, window_days: i64, now: DateTime<Utc>) -> PerformanceSnapshot {
        let state = self.state.read().await;
        PerformanceSnapshot::window(&state.records, window_days, now)
    }

    /// Performance over records with a timestamp in `[start, end)`.
    pub async fn metrics_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> PerformanceSnapshot {
        let state = self.state.read().await;
        PerformanceSnapshot::between(&state.records, start, end)
    }

    /// Run a read-only computation over the records under the read lock.
    pub async fn with_records<T>(&self, f: impl FnOnce(&[SignalRecord]) -> T) -> T {
        let state = self.state.read().await;
        f(&state.records)
    }

    /// Look up a signal by id.
    pub async fn get(&self, id: &str) -> Option<SignalRecord> {
        self.state.read().await.get(id).cloned()
    }

    /// Number of stored signals.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Whether no signal is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Persist newly emitted improvement actions.
    pub async fn record_improvements(&self, actions: &[ImprovementAction]) -> DomainResult<()> {
        let mut state = self.state.write().await;
        for action in actions {
            self.repository.upsert_improvement(action).await?;
            state.improvements.push(action.clone());
            tracing::info!(
                action_id = %action.id,
                improvement_type = %action.improvement_type,
                "Recorded improvement action"
            );
        }
        Ok(())
    }

    /// Fill in the measured effect of an improvement action.
    pub async fn set_performance_after(&self, id: &str, performance_after: PerformanceMap) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let pos = state
            .improvements
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| DomainError::ImprovementNotFound(id.to_string()))?;

        self.repository.update_performance_after(id, &performance_after).await?;
        state.improvements[pos].performance_after = Some(performance_after);
        Ok(())
    }

    /// All improvement actions in emission order.
    pub async fn improvements(&self) -> Vec<ImprovementAction> {
        self.state.read().await.improvements.clone()
    }

    /// Counts and index state for reporting.
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        StoreStats {
            total_signals: state.records.len(),
            embedded_signals: state.embedded_count(),
            improvements: state.improvements.len(),
            index_size: state.index.len(),
            index_dimension: state.index.dimension(),
            last_index_update: state.last_index_update,
            embedding_provider: self.embedder.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::embeddings::HashingEmbeddingProvider;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteSignalRepository};
    use crate::domain::models::DecisionType;
    use crate::domain::ports::SignatureEmbedding;
    use async_trait::async_trait;
    use chrono::Duration;

    struct DownProvider;

    #[async_trait]
    impl EmbeddingProvider for DownProvider {
        fn name(&self) -> &'static str {
            "down"
        }

        fn dimension(&self) -> usize {
            16
        }

        async fn embed(&self, _text: &str) -> DomainResult<Vec<f32>> {
            Err(DomainError::EmbeddingError("provider unavailable".to_string()))
        }

        async fn embed_signatures(&self, _inputs: &[SignatureInput]) -> DomainResult<Vec<SignatureEmbedding>> {
            Err(DomainError::EmbeddingError("provider unavailable".to_string()))
        }

        fn max_batch_size(&self) -> usize {
            16
        }
    }

    async fn open_store(embedder: Arc<dyn EmbeddingProvider>) -> SignalStore<SqliteSignalRepository> {
        let pool = create_migrated_test_pool().await.unwrap();
        let repository = Arc::new(SqliteSignalRepository::new(pool));
        SignalStore::open(repository, embedder).await.unwrap()
    }

    fn hashing() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingEmbeddingProvider::new(64))
    }

    #[tokio::test]
    async fn test_store_embeds_and_indexes() {
        let store = open_store(hashing()).await;
        let stored = store
            .store(SignalRecord::new("BTC", DecisionType::Buy, 0.7, "breakout above resistance"))
            .await
            .unwrap();

        assert!(stored.indexed);
        assert!(!stored.replaced);
        let stats = store.stats().await;
        assert_eq!(stats.total_signals, 1);
        assert_eq!(stats.index_size, 1);
        assert_eq!(stats.index_dimension, Some(64));
        assert_eq!(stats.embedding_provider, "hashing");
    }

    #[tokio::test]
    async fn test_store_rejects_invalid_confidence() {
        let store = open_store(hashing()).await;
        let result = store.store(SignalRecord::new("BTC", DecisionType::Buy, 1.5, "x")).await;
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
        assert!(store.is_empty().await);
        assert!(store.repository().list_signals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_rejects_dimension_mismatch() {
        let store = open_store(hashing()).await;
        store
            .store(SignalRecord::new("BTC", DecisionType::Buy, 0.5, "a"))
            .await
            .unwrap();

        let result = store
            .store(SignalRecord::new("BTC", DecisionType::Buy, 0.5, "b").with_embedding(vec![1.0; 3]))
            .await;
        assert!(matches!(result, Err(DomainError::DimensionMismatch { expected: 64, actual: 3 })));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_provider_failure_persists_nothing() {
        let store = open_store(Arc::new(DownProvider)).await;
        let result = store.store(SignalRecord::new("ETH", DecisionType::Sell, 0.5, "x")).await;

        let err = result.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.is_empty().await);
        assert!(store.repository().list_signals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_allow_unindexed_mode() {
        let store = open_store(Arc::new(DownProvider)).await;
        let stored = store
            .store_with_mode(
                SignalRecord::new("ETH", DecisionType::Sell, 0.5, "x"),
                EmbeddingMode::AllowUnindexed,
            )
            .await
            .unwrap();

        assert!(!stored.indexed);
        let stats = store.stats().await;
        assert_eq!(stats.total_signals, 1);
        assert_eq!(stats.embedded_signals, 0);
        assert_eq!(stats.index_size, 0);
    }

    #[tokio::test]
    async fn test_duplicate_id_leaves_one_record() {
        let store = open_store(hashing()).await;
        let first = SignalRecord::new("SOL", DecisionType::Buy, 0.5, "first").with_id("dup");
        let second = SignalRecord::new("SOL", DecisionType::Sell, 0.6, "second").with_id("dup");

        store.store(first).await.unwrap();
        let stored = store.store(second).await.unwrap();

        assert!(stored.replaced);
        let stats = store.stats().await;
        assert_eq!(stats.total_signals, 1);
        assert_eq!(stats.index_size, stats.embedded_signals);
        assert_eq!(store.get("dup").await.unwrap().reasoning, "second");
    }

    #[tokio::test]
    async fn test_update_outcome() {
        let store = open_store(hashing()).await;
        let stored = store
            .store(SignalRecord::new("BTC", DecisionType::Buy, 0.7, "x"))
            .await
            .unwrap();

        let mut metrics = PerformanceMetrics::new();
        metrics.insert("pnl".into(), 1.2);
        store
            .update_outcome(&stored.id, SignalOutcome::Success, Some(metrics))
            .await
            .unwrap();

        let record = store.get(&stored.id).await.unwrap();
        assert_eq!(record.outcome, SignalOutcome::Success);
        assert_eq!(record.performance_metrics.unwrap()["pnl"], 1.2);

        let missing = store.update_outcome("nope", SignalOutcome::Failure, None).await;
        assert!(matches!(missing, Err(DomainError::SignalNotFound(_))));
    }

    #[tokio::test]
    async fn test_cleanup_then_search_repairs_index() {
        let store = open_store(hashing()).await;
        let now = Utc::now();
        for days in [40, 35, 2, 1] {
            store
                .store(
                    SignalRecord::new("BTC", DecisionType::Buy, 0.5, format!("signal {}", days))
                        .with_timestamp(now - Duration::days(days)),
                )
                .await
                .unwrap();
        }

        let removed = store.cleanup(now - Duration::days(30)).await.unwrap();
        assert_eq!(removed, 2);

        let stats = store.stats().await;
        assert_eq!(stats.total_signals, 2);
        assert_eq!(stats.index_size, 4);

        let query = SignalQuery::new("BTC", DecisionType::Buy, "signal 1");
        let results = store.find_similar(&query, 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(store.stats().await.index_size, 2);
    }

    #[tokio::test]
    async fn test_open_restores_and_backfills() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repository = Arc::new(SqliteSignalRepository::new(pool));

        let embedded = SignalRecord::new("BTC", DecisionType::Buy, 0.5, "embedded")
            .with_embedding(HashingEmbeddingProvider::new(64).embed_text("BTC BUY embedded"));
        let bare = SignalRecord::new("BTC", DecisionType::Hold, 0.5, "bare");
        repository.upsert_signal(&embedded).await.unwrap();
        repository.upsert_signal(&bare).await.unwrap();

        let store = SignalStore::open(repository.clone(), hashing()).await.unwrap();
        let stats = store.stats().await;
        assert_eq!(stats.total_signals, 2);
        assert_eq!(stats.embedded_signals, 2);
        assert_eq!(stats.index_size, 2);

        let persisted = repository.list_signals().await.unwrap();
        assert!(persisted.iter().all(|s| s.embedding.is_some()));
    }

    #[tokio::test]
    async fn test_open_survives_backfill_failure() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repository = Arc::new(SqliteSignalRepository::new(pool));
        repository
            .upsert_signal(&SignalRecord::new("BTC", DecisionType::Hold, 0.5, "bare"))
            .await
            .unwrap();

        let store = SignalStore::open(repository, Arc::new(DownProvider)).await.unwrap();
        let stats = store.stats().await;
        assert_eq!(stats.total_signals, 1);
        assert_eq!(stats.index_size, 0);
    }

    #[tokio::test]
    async fn test_open_keeps_stored_dimension_after_provider_change() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repository = Arc::new(SqliteSignalRepository::new(pool));

        let embedded = SignalRecord::new("BTC", DecisionType::Buy, 0.5, "embedded")
            .with_timestamp(Utc::now() - Duration::hours(2))
            .with_embedding(HashingEmbeddingProvider::new(64).embed_text("BTC BUY embedded"));
        let bare = SignalRecord::new("BTC", DecisionType::Hold, 0.5, "bare");
        repository.upsert_signal(&embedded).await.unwrap();
        repository.upsert_signal(&bare).await.unwrap();

        let narrower: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new(32));
        let store = SignalStore::open(repository.clone(), narrower.clone()).await.unwrap();
        let stats = store.stats().await;
        assert_eq!(stats.index_size, 1);
        assert_eq!(stats.index_dimension, Some(64));
        assert_eq!(stats.embedded_signals, 1);

        let dims: Vec<Option<usize>> = repository
            .list_signals()
            .await
            .unwrap()
            .iter()
            .map(|s| s.embedding.as_ref().map(Vec::len))
            .collect();
        assert_eq!(dims, vec![Some(64), None]);

        // a second open behaves the same
        let reopened = SignalStore::open(repository, narrower).await.unwrap();
        assert_eq!(reopened.stats().await.index_size, 1);
    }

    #[tokio::test]
    async fn test_open_tolerates_mixed_dimensions_on_disk() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repository = Arc::new(SqliteSignalRepository::new(pool));

        let wide = SignalRecord::new("BTC", DecisionType::Buy, 0.5, "wide")
            .with_timestamp(Utc::now() - Duration::hours(2))
            .with_embedding(HashingEmbeddingProvider::new(64).embed_text("BTC BUY wide"));
        let narrow = SignalRecord::new("ETH", DecisionType::Sell, 0.5, "narrow")
            .with_embedding(HashingEmbeddingProvider::new(32).embed_text("ETH SELL narrow"));
        repository.upsert_signal(&wide).await.unwrap();
        repository.upsert_signal(&narrow).await.unwrap();

        let store = SignalStore::open(repository, hashing()).await.unwrap();
        let stats = store.stats().await;
        assert_eq!(stats.total_signals, 2);
        assert_eq!(stats.embedded_signals, 2);
        assert_eq!(stats.index_size, 1);
        assert_eq!(stats.index_dimension, Some(64));

        let query = SignalQuery::new("BTC", DecisionType::Buy, "wide");
        let results = store.find_similar(&query, 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].signal.id, wide.id);
    }
}
