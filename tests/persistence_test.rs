use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;

use signal_memory::domain::models::MarketSnapshot;
use signal_memory::{
    CandidateDecision, Config, DecisionMemory, DecisionType, SignalOutcome, SignalQuery,
};

fn on_disk_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.path = dir
        .path()
        .join("nested")
        .join("signals.db")
        .to_string_lossy()
        .into_owned();
    config.embedding.dimension = 128;
    config
}

#[tokio::test]
async fn test_signals_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = on_disk_config(&dir);

    let mut snapshot = MarketSnapshot::new();
    snapshot.insert("price".to_string(), json!(64250.5));
    snapshot.insert("rsi".to_string(), json!(61));

    let (first_id, second_id) = {
        let memory = DecisionMemory::from_config(&config).await.unwrap();
        let first = memory
            .process(
                CandidateDecision::new("BTC", DecisionType::Buy, 0.7, "breakout above resistance")
                    .with_market_snapshot(snapshot.clone()),
            )
            .await
            .unwrap();
        memory
            .update_outcome(&first.signal_id, SignalOutcome::Success, None)
            .await
            .unwrap();
        let second = memory
            .process(CandidateDecision::new("ETH", DecisionType::Sell, 0.4, "funding negative"))
            .await
            .unwrap();
        (first.signal_id, second.signal_id)
    };

    let memory = DecisionMemory::from_config(&config).await.unwrap();

    let stats = memory.stats().await;
    assert_eq!(stats.total_signals, 2);
    assert_eq!(stats.index_size, 2);
    assert_eq!(stats.index_dimension, Some(128));
    assert_eq!(stats.embedding_provider, "hashing");

    let first = memory.signal_store().get(&first_id).await.unwrap();
    assert_eq!(first.outcome, SignalOutcome::Success);
    assert_eq!(first.market_snapshot, snapshot);
    assert!(first.timestamp <= Utc::now());

    let second = memory.signal_store().get(&second_id).await.unwrap();
    assert_eq!(second.outcome, SignalOutcome::Pending);
    assert_eq!(second.decision_type, DecisionType::Sell);

    let query = SignalQuery::new("BTC", DecisionType::Buy, "breakout above resistance");
    let matches = memory.find_similar(&query, 1).await.unwrap();
    assert_eq!(matches[0].signal.id, first_id);

    let decision = memory
        .process(CandidateDecision::new("BTC", DecisionType::Buy, 0.7, "breakout above resistance"))
        .await
        .unwrap();
    assert_eq!(decision.historical_context[0].signal_id, first_id);
    assert!(decision.adjustment > 0.0);
}

#[tokio::test]
async fn test_cleanup_is_durable() {
    let dir = tempfile::tempdir().unwrap();
    let config = on_disk_config(&dir);

    {
        let memory = DecisionMemory::from_config(&config).await.unwrap();
        memory
            .process(CandidateDecision::new("BTC", DecisionType::Hold, 0.5, "chop"))
            .await
            .unwrap();
        let removed = memory
            .cleanup(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    let memory = DecisionMemory::from_config(&config).await.unwrap();
    let stats = memory.stats().await;
    assert_eq!(stats.total_signals, 0);
    assert_eq!(stats.index_size, 0);
}
