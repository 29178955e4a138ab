//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use signal_memory::adapters::sqlite::{create_migrated_test_pool, SqliteSignalRepository};
use signal_memory::domain::models::{PerformanceMap, PerformanceMetrics};
use signal_memory::domain::ports::{SignatureEmbedding, SignatureInput};
use signal_memory::{
    Config, DecisionMemory, DecisionType, DomainError, DomainResult, EmbeddingProvider,
    HashingEmbeddingProvider, ImprovementAction, SignalOutcome, SignalRecord, SignalRepository,
};

pub const TEST_DIMENSION: usize = 64;

/// Hashing provider that can be switched into a retryable outage.
pub struct FlakyEmbeddingProvider {
    inner: HashingEmbeddingProvider,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: HashingEmbeddingProvider::new(dimension),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(dimension: usize) -> Self {
        let provider = Self::new(dimension);
        provider.set_failing(true);
        provider
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> DomainResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::EmbeddingError("provider unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbeddingProvider {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        self.check()?;
        self.inner.embed(text).await
    }

    async fn embed_signatures(&self, inputs: &[SignatureInput]) -> DomainResult<Vec<SignatureEmbedding>> {
        self.check()?;
        self.inner.embed_signatures(inputs).await
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }
}

/// SQLite repository whose writes can be switched to fail with a storage error.
pub struct FailingRepository {
    inner: Arc<SqliteSignalRepository>,
    failing: AtomicBool,
}

impl FailingRepository {
    pub fn new(inner: Arc<SqliteSignalRepository>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &Arc<SqliteSignalRepository> {
        &self.inner
    }

    fn check(&self) -> DomainResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::StorageError("database is locked".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SignalRepository for FailingRepository {
    async fn upsert_signal(&self, signal: &SignalRecord) -> DomainResult<()> {
        self.check()?;
        self.inner.upsert_signal(signal).await
    }

    async fn list_signals(&self) -> DomainResult<Vec<SignalRecord>> {
        self.inner.list_signals().await
    }

    async fn delete_signals_before(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        self.check()?;
        self.inner.delete_signals_before(cutoff).await
    }

    async fn update_outcome(
        &self,
        id: &str,
        outcome: SignalOutcome,
        metrics: Option<&PerformanceMetrics>,
    ) -> DomainResult<()> {
        self.check()?;
        self.inner.update_outcome(id, outcome, metrics).await
    }

    async fn update_embedding(&self, id: &str, embedding: &[f32]) -> DomainResult<()> {
        self.check()?;
        self.inner.update_embedding(id, embedding).await
    }

    async fn upsert_improvement(&self, action: &ImprovementAction) -> DomainResult<()> {
        self.check()?;
        self.inner.upsert_improvement(action).await
    }

    async fn list_improvements(&self) -> DomainResult<Vec<ImprovementAction>> {
        self.inner.list_improvements().await
    }

    async fn update_performance_after(
        &self,
        id: &str,
        performance_after: &PerformanceMap,
    ) -> DomainResult<()> {
        self.check()?;
        self.inner.update_performance_after(id, performance_after).await
    }
}

pub async fn test_repository() -> Arc<SqliteSignalRepository> {
    let pool = create_migrated_test_pool()
        .await
        .expect("failed to create test database");
    Arc::new(SqliteSignalRepository::new(pool))
}

/// Memory over a fresh in-memory database with the hashing provider.
pub async fn setup_memory() -> DecisionMemory<SqliteSignalRepository> {
    setup_memory_with(Config::default()).await
}

pub async fn setup_memory_with(config: Config) -> DecisionMemory<SqliteSignalRepository> {
    DecisionMemory::open(
        test_repository().await,
        Arc::new(HashingEmbeddingProvider::new(TEST_DIMENSION)),
        &config,
    )
    .await
    .expect("failed to open decision memory")
}

pub fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

/// A resolved signal stamped at `at`.
pub fn resolved_signal(
    outcome: SignalOutcome,
    confidence: f64,
    at: DateTime<Utc>,
) -> SignalRecord {
    SignalRecord::new("BTC", DecisionType::Buy, confidence, "momentum continuation")
        .with_timestamp(at)
        .with_outcome(outcome)
}

pub fn pending_signal(symbol: &str, reasoning: &str) -> SignalRecord {
    SignalRecord::new(symbol, DecisionType::Buy, 0.6, reasoning)
}

/// Seed a clear regression ending at `now`.
///
/// Recent window (last 7 days): 3 successes and 7 failures at 0.75
/// confidence. Days 8 to 13: 9 successes and 1 failure. Recent success rate
/// is 0.3 against a 14-day baseline of 0.6.
pub async fn seed_regression<R: SignalRepository + 'static>(memory: &DecisionMemory<R>, now: DateTime<Utc>) {
    for i in 0..3 {
        memory
            .store(resolved_signal(SignalOutcome::Success, 0.6, days_ago(now, 1) - Duration::hours(i)))
            .await
            .expect("store recent success");
    }
    for i in 0..7 {
        memory
            .store(resolved_signal(SignalOutcome::Failure, 0.75, days_ago(now, 2) - Duration::hours(i)))
            .await
            .expect("store recent failure");
    }
    for day in 8..=13 {
        let outcome = SignalOutcome::Success;
        memory
            .store(resolved_signal(outcome, 0.6, days_ago(now, day)))
            .await
            .expect("store baseline success");
    }
    for i in 0..3 {
        memory
            .store(resolved_signal(SignalOutcome::Success, 0.6, days_ago(now, 9) - Duration::hours(i + 1)))
            .await
            .expect("store baseline success");
    }
    memory
        .store(resolved_signal(SignalOutcome::Failure, 0.6, days_ago(now, 10) - Duration::hours(3)))
        .await
        .expect("store baseline failure");
}
