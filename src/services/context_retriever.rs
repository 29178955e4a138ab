//! Historical context retrieval for new decisions.

use std::sync::Arc;

use super::confidence_adjuster::ConfidenceAdjuster;
use super::signal_store::SignalStore;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::signal::validate_confidence;
use crate::domain::models::{
    CandidateDecision, EnhancedDecision, HistoricalContext, RetrievalConfig, SignalRecord,
};
use crate::domain::ports::SignalRepository;

/// Enriches a candidate decision with comparable past decisions, then
/// records it.
pub struct ContextRetriever<R: SignalRepository> {
    store: Arc<SignalStore<R>>,
    adjuster: ConfidenceAdjuster,
    config: RetrievalConfig,
}

impl<R: SignalRepository> ContextRetriever<R> {
    /// Retriever over `store` with default retrieval settings.
    pub fn new(store: Arc<SignalStore<R>>) -> Self {
        Self {
            store,
            adjuster: ConfidenceAdjuster::new(),
            config: RetrievalConfig::default(),
        }
    }

    /// Override the search and report limits.
    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Retrieve context for `candidate`, adjust its confidence and persist it
    /// as a new pending signal.
    ///
    /// The signature is embedded once and the vector is reused for storage.
    /// Retrieval runs before persistence, so the candidate never matches
    /// itself.
    pub async fn process(&self, candidate: CandidateDecision) -> DomainResult<EnhancedDecision> {
        validate_confidence(candidate.confidence).map_err(DomainError::ValidationFailed)?;

        let embedding = self.store.embed(&candidate.signature()).await?;
        let matches = self.store.search(&embedding, self.config.search_limit).await?;

        let context = HistoricalContext::from_matches(&matches);
        let (adjustment, final_confidence) = self.adjuster.apply(candidate.confidence, &context);

        let record = SignalRecord::new(
            candidate.symbol.clone(),
            candidate.decision_type,
            candidate.confidence,
            candidate.reasoning,
        )
        .with_market_snapshot(candidate.market_snapshot)
        .with_embedding(embedding);
        let stored = self.store.store(record).await?;

        tracing::info!(
            signal_id = %stored.id,
            symbol = %candidate.symbol,
            matches = context.total_similar,
            adjustment,
            final_confidence,
            "Processed decision with historical context"
        );

        Ok(EnhancedDecision {
            signal_id: stored.id,
            symbol: candidate.symbol,
            decision_type: candidate.decision_type,
            original_confidence: candidate.confidence,
            adjustment,
            final_confidence,
            historical_context: matches
                .iter()
                .take(self.config.report_limit)
                .map(|m| m.summary())
                .collect(),
            context_analysis: context,
        })
    }
}
