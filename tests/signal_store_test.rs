mod helpers;

use std::sync::Arc;

use chrono::Utc;
use helpers::{days_ago, pending_signal, resolved_signal, test_repository, FlakyEmbeddingProvider, TEST_DIMENSION};
use signal_memory::services::EmbeddingMode;
use signal_memory::{
    Config, DecisionMemory, DecisionType, DomainError, SignalOutcome, SignalQuery, SignalRecord,
    SignalRepository,
};

#[tokio::test]
async fn test_find_similar_ranks_closest_first() {
    let memory = helpers::setup_memory().await;

    let breakout = memory
        .store(pending_signal("BTC", "breakout above weekly resistance on volume"))
        .await
        .unwrap();
    memory
        .store(pending_signal("ETH", "funding rates deeply negative"))
        .await
        .unwrap();
    memory
        .store(SignalRecord::new("SOL", DecisionType::Sell, 0.4, "exchange outflows slowing"))
        .await
        .unwrap();

    let query = SignalQuery::new("BTC", DecisionType::Buy, "breakout above weekly resistance on volume");
    let matches = memory.find_similar(&query, 2).await.unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].signal.id, breakout.id);
    assert!((matches[0].similarity - 1.0).abs() < 1e-4);
    assert!(matches[0].similarity >= matches[1].similarity);
}

#[tokio::test]
async fn test_find_similar_on_empty_store() {
    let memory = helpers::setup_memory().await;
    let query = SignalQuery::new("BTC", DecisionType::Buy, "anything");
    assert!(memory.find_similar(&query, 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_required_embedding_failure_persists_nothing() {
    let repository = test_repository().await;
    let provider = Arc::new(FlakyEmbeddingProvider::new(TEST_DIMENSION));
    let memory = DecisionMemory::open(repository, provider.clone(), &Config::default())
        .await
        .unwrap();

    provider.set_failing(true);
    let result = memory.store(pending_signal("BTC", "breakout")).await;

    assert!(matches!(result, Err(DomainError::EmbeddingError(_))));
    assert_eq!(memory.stats().await.total_signals, 0);
}

#[tokio::test]
async fn test_unindexed_signal_is_backfilled() {
    let repository = test_repository().await;
    let provider = Arc::new(FlakyEmbeddingProvider::failing(TEST_DIMENSION));
    let memory = DecisionMemory::open(repository, provider.clone(), &Config::default())
        .await
        .unwrap();

    let stored = memory
        .store_with_mode(pending_signal("BTC", "breakout"), EmbeddingMode::AllowUnindexed)
        .await
        .unwrap();
    assert!(!stored.indexed);

    let stats = memory.stats().await;
    assert_eq!(stats.total_signals, 1);
    assert_eq!(stats.embedded_signals, 0);
    assert_eq!(stats.index_size, 0);

    provider.set_failing(false);
    assert_eq!(memory.backfill_embeddings().await.unwrap(), 1);

    let stats = memory.stats().await;
    assert_eq!(stats.embedded_signals, 1);
    assert_eq!(stats.index_size, 1);

    let query = SignalQuery::new("BTC", DecisionType::Buy, "breakout");
    let matches = memory.find_similar(&query, 1).await.unwrap();
    assert_eq!(matches[0].signal.id, stored.id);
}

#[tokio::test]
async fn test_open_backfills_records_stored_without_embedding() {
    let repository = test_repository().await;

    let offline = Arc::new(FlakyEmbeddingProvider::failing(TEST_DIMENSION));
    let first = DecisionMemory::open(repository.clone(), offline.clone(), &Config::default())
        .await
        .unwrap();
    first
        .store_with_mode(pending_signal("BTC", "breakout"), EmbeddingMode::AllowUnindexed)
        .await
        .unwrap();
    drop(first);

    let online = Arc::new(FlakyEmbeddingProvider::new(TEST_DIMENSION));
    let second = DecisionMemory::open(repository, online.clone(), &Config::default())
        .await
        .unwrap();

    let stats = second.stats().await;
    assert_eq!(stats.total_signals, 1);
    assert_eq!(stats.index_size, 1);
    assert_eq!(stats.embedding_provider, "flaky");
    assert!(online.calls() >= 1);
}

#[tokio::test]
async fn test_open_survives_provider_outage() {
    let repository = test_repository().await;
    let offline = Arc::new(FlakyEmbeddingProvider::failing(TEST_DIMENSION));

    let first = DecisionMemory::open(repository.clone(), offline.clone(), &Config::default())
        .await
        .unwrap();
    first
        .store_with_mode(pending_signal("BTC", "breakout"), EmbeddingMode::AllowUnindexed)
        .await
        .unwrap();
    drop(first);

    let reopened = DecisionMemory::open(repository, offline, &Config::default())
        .await
        .unwrap();
    let stats = reopened.stats().await;
    assert_eq!(stats.total_signals, 1);
    assert_eq!(stats.index_size, 0);
}

#[tokio::test]
async fn test_search_finds_backfilled_signal_after_cleanup() {
    let repository = test_repository().await;
    let provider = Arc::new(FlakyEmbeddingProvider::new(TEST_DIMENSION));
    let memory = DecisionMemory::open(repository, provider.clone(), &Config::default())
        .await
        .unwrap();
    let store = memory.signal_store();
    let now = Utc::now();

    store
        .store(resolved_signal(SignalOutcome::Success, 0.6, days_ago(now, 40)))
        .await
        .unwrap();

    provider.set_failing(true);
    let fresh = store
        .store_with_mode(pending_signal("ETH", "funding flipped"), EmbeddingMode::AllowUnindexed)
        .await
        .unwrap();
    provider.set_failing(false);

    assert_eq!(store.backfill_embeddings().await.unwrap(), 1);
    assert_eq!(store.cleanup(days_ago(now, 30)).await.unwrap(), 1);

    let stats = memory.stats().await;
    assert_eq!(stats.embedded_signals, 1);
    assert_eq!(stats.index_size, 1);

    let query = SignalQuery::new("ETH", DecisionType::Buy, "funding flipped");
    let matches = memory.find_similar(&query, 5).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].signal.id, fresh.id);
}

#[tokio::test]
async fn test_open_after_provider_dimension_change() {
    let repository = test_repository().await;
    let first = DecisionMemory::open(
        repository.clone(),
        Arc::new(FlakyEmbeddingProvider::new(TEST_DIMENSION)),
        &Config::default(),
    )
    .await
    .unwrap();
    let embedded = first.store(pending_signal("BTC", "breakout")).await.unwrap();
    drop(first);

    // stored without embedding directly, as an older writer would
    repository
        .upsert_signal(&pending_signal("ETH", "range"))
        .await
        .unwrap();

    let narrower = Arc::new(FlakyEmbeddingProvider::new(TEST_DIMENSION / 2));
    for _ in 0..2 {
        let memory = DecisionMemory::open(repository.clone(), narrower.clone(), &Config::default())
            .await
            .unwrap();
        let stats = memory.stats().await;
        assert_eq!(stats.total_signals, 2);
        assert_eq!(stats.index_size, 1);
        assert_eq!(stats.index_dimension, Some(TEST_DIMENSION));
        assert!(memory.signal_store().get(&embedded.id).await.is_some());
    }

    let dimensions: Vec<Option<usize>> = repository
        .list_signals()
        .await
        .unwrap()
        .iter()
        .map(|s| s.embedding.as_ref().map(Vec::len))
        .collect();
    assert!(dimensions.contains(&Some(TEST_DIMENSION)));
    assert!(dimensions.contains(&None));
    assert!(!dimensions.contains(&Some(TEST_DIMENSION / 2)));
}

#[tokio::test]
async fn test_oversized_metrics_window_covers_all_history() {
    let memory = helpers::setup_memory().await;
    let now = Utc::now();
    memory
        .store(resolved_signal(SignalOutcome::Success, 0.8, days_ago(now, 900)))
        .await
        .unwrap();

    let snapshot = memory.metrics(100_000_000).await;
    assert_eq!(snapshot.total_signals, 1);
    assert_eq!(memory.metrics(i64::MAX).await.total_signals, 1);
}

#[tokio::test]
async fn test_dimension_mismatch_is_rejected() {
    let memory = helpers::setup_memory().await;
    memory.store(pending_signal("BTC", "breakout")).await.unwrap();

    let result = memory
        .store(pending_signal("ETH", "range").with_embedding(vec![0.5; TEST_DIMENSION / 2]))
        .await;

    assert!(matches!(
        result,
        Err(DomainError::DimensionMismatch { expected, actual })
            if expected == TEST_DIMENSION && actual == TEST_DIMENSION / 2
    ));
    assert_eq!(memory.stats().await.total_signals, 1);
}

#[tokio::test]
async fn test_invalid_confidence_is_rejected() {
    let memory = helpers::setup_memory().await;
    let result = memory
        .store(SignalRecord::new("BTC", DecisionType::Buy, 1.5, "too sure"))
        .await;
    assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
}

#[tokio::test]
async fn test_store_same_id_replaces_record() {
    let memory = helpers::setup_memory().await;
    let original = pending_signal("BTC", "breakout").with_id("fixed-id");
    memory.store(original).await.unwrap();

    let stored = memory
        .store(pending_signal("BTC", "breakdown").with_id("fixed-id"))
        .await
        .unwrap();
    assert!(stored.replaced);

    let stats = memory.stats().await;
    assert_eq!(stats.total_signals, 1);
    assert_eq!(stats.index_size, 1);

    let record = memory.signal_store().get("fixed-id").await.unwrap();
    assert_eq!(record.reasoning, "breakdown");
}

#[tokio::test]
async fn test_cleanup_removes_old_signals_and_keeps_index_consistent() {
    let memory = helpers::setup_memory().await;
    let now = Utc::now();

    let old = memory
        .store(resolved_signal(SignalOutcome::Success, 0.6, days_ago(now, 40)))
        .await
        .unwrap();
    let recent = memory
        .store(resolved_signal(SignalOutcome::Failure, 0.6, days_ago(now, 2)))
        .await
        .unwrap();

    let removed = memory.cleanup(days_ago(now, 30)).await.unwrap();
    assert_eq!(removed, 1);

    let stats = memory.stats().await;
    assert_eq!(stats.total_signals, 1);
    assert_eq!(stats.index_size, 1);
    assert!(memory.signal_store().get(&old.id).await.is_none());
    assert!(memory.signal_store().get(&recent.id).await.is_some());

    let query = SignalQuery::new("BTC", DecisionType::Buy, "momentum continuation");
    let matches = memory.find_similar(&query, 10).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].signal.id, recent.id);
}

#[tokio::test]
async fn test_metrics_window() {
    let memory = helpers::setup_memory().await;
    let now = Utc::now();

    memory
        .store(resolved_signal(SignalOutcome::Success, 0.8, days_ago(now, 1)))
        .await
        .unwrap();
    memory
        .store(resolved_signal(SignalOutcome::Failure, 0.4, days_ago(now, 3)))
        .await
        .unwrap();
    memory
        .store(resolved_signal(SignalOutcome::Failure, 0.4, days_ago(now, 20)))
        .await
        .unwrap();
    memory.store(pending_signal("BTC", "not yet resolved")).await.unwrap();

    let snapshot = memory.metrics(7).await;
    assert_eq!(snapshot.total_signals, 2);
    assert_eq!(snapshot.successful_signals, 1);
    assert_eq!(snapshot.failed_signals, 1);
    assert!((snapshot.success_rate - 0.5).abs() < 1e-9);
    assert!((snapshot.avg_confidence - 0.6).abs() < 1e-9);

    assert!(memory.metrics(0).await.is_empty());
}
