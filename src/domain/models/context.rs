//! Historical context models used when enriching a new decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::{
    signature_text, DecisionType, MarketSnapshot, SignalOutcome, SignalRecord,
};

/// A stored signal returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarSignal {
    /// The stored record
    pub signal: SignalRecord,
    /// Inner-product similarity to the query (higher is closer)
    pub similarity: f32,
}

impl SimilarSignal {
    /// Compact form reported back to callers.
    pub fn summary(&self) -> ContextEntry {
        ContextEntry {
            signal_id: self.signal.id.clone(),
            similarity: self.similarity,
            outcome: self.signal.outcome,
            confidence: self.signal.confidence,
            timestamp: self.signal.timestamp,
        }
    }
}

/// One historical match as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Matched signal id
    pub signal_id: String,
    /// Similarity to the query
    pub similarity: f32,
    /// Outcome of the match
    pub outcome: SignalOutcome,
    /// Confidence of the match
    pub confidence: f64,
    /// Decision time of the match
    pub timestamp: DateTime<Utc>,
}

/// Summary statistics of the retrieved matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalContext {
    /// Fraction of matches that resolved as SUCCESS
    pub success_rate: f64,
    /// Mean confidence of the matches
    pub avg_confidence: f64,
    /// Mean similarity of the matches
    pub avg_similarity: f64,
    /// Number of matches
    pub total_similar: usize,
}

impl Default for HistoricalContext {
    fn default() -> Self {
        Self {
            success_rate: 0.5,
            avg_confidence: 0.5,
            avg_similarity: 0.0,
            total_similar: 0,
        }
    }
}

impl HistoricalContext {
    /// Summarize a list of matches. No matches yields the neutral default.
    pub fn from_matches(matches: &[SimilarSignal]) -> Self {
        if matches.is_empty() {
            return Self::default();
        }

        let n = matches.len() as f64;
        let successes = matches
            .iter()
            .filter(|m| m.signal.outcome == SignalOutcome::Success)
            .count();

        Self {
            success_rate: successes as f64 / n,
            avg_confidence: matches.iter().map(|m| m.signal.confidence).sum::<f64>() / n,
            avg_similarity: matches.iter().map(|m| f64::from(m.similarity)).sum::<f64>() / n,
            total_similar: matches.len(),
        }
    }

    /// Whether no history was found.
    pub fn is_empty(&self) -> bool {
        self.total_similar == 0
    }
}

/// A decision submitted for context enrichment before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDecision {
    /// Subject symbol
    pub symbol: String,
    /// Direction of the decision
    pub decision_type: DecisionType,
    /// Confidence proposed by the caller
    pub confidence: f64,
    /// Free-text rationale
    pub reasoning: String,
    /// Market state at decision time
    #[serde(default)]
    pub market_snapshot: MarketSnapshot,
}

impl CandidateDecision {
    /// Candidate with an empty market snapshot.
    pub fn new(
        symbol: impl Into<String>,
        decision_type: DecisionType,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            decision_type,
            confidence,
            reasoning: reasoning.into(),
            market_snapshot: MarketSnapshot::new(),
        }
    }

    /// Attach a market snapshot.
    pub fn with_market_snapshot(mut self, snapshot: MarketSnapshot) -> Self {
        self.market_snapshot = snapshot;
        self
    }

    /// Text embedded for the lookup.
    pub fn signature(&self) -> String {
        signature_text(&self.symbol, self.decision_type, &self.reasoning)
    }
}

/// Result of processing a candidate decision against its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedDecision {
    /// Id assigned to the candidate when it was persisted
    pub signal_id: String,
    /// Subject symbol
    pub symbol: String,
    /// Direction of the decision
    pub decision_type: DecisionType,
    /// Confidence proposed by the caller
    pub original_confidence: f64,
    /// Signed change applied to it
    pub adjustment: f64,
    /// `clamp(original_confidence + adjustment, 0, 1)`
    pub final_confidence: f64,
    /// Top matches, most similar first
    pub historical_context: Vec<ContextEntry>,
    /// Statistics of the matches
    pub context_analysis: HistoricalContext,
}

impl EnhancedDecision {
    /// Human-readable note describing the adjustment, if any was applied.
    pub fn context_note(&self) -> Option<String> {
        if self.adjustment == 0.0 {
            return None;
        }
        let direction = if self.adjustment > 0.0 { "increased" } else { "decreased" };
        Some(format!(
            "Historical context suggests {} confidence (±{:.2})",
            direction,
            self.adjustment.abs()
        ))
    }
}
