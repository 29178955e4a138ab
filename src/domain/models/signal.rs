//! Signal domain model.
//!
//! A signal is a timestamped trading decision (BUY/SELL/HOLD on a symbol)
//! together with the reasoning behind it and, once known, its resolved
//! outcome. Signals carry an optional embedding of their text signature so
//! that historically comparable decisions can be retrieved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Opaque market data captured at decision time.
pub type MarketSnapshot = serde_json::Map<String, serde_json::Value>;

/// Numeric performance figures attached to a resolved signal.
pub type PerformanceMetrics = BTreeMap<String, f64>;

/// Direction of a trading decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionType {
    Buy,
    Sell,
    Hold,
}

impl Default for DecisionType {
    fn default() -> Self {
        Self::Hold
    }
}

impl DecisionType {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }

    /// Parse a wire name, ignoring case.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            "HOLD" => Some(Self::Hold),
            _ => None,
        }
    }
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution state of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalOutcome {
    Pending,
    Success,
    Failure,
    Partial,
}

impl Default for SignalOutcome {
    fn default() -> Self {
        Self::Pending
    }
}

impl SignalOutcome {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Partial => "partial",
        }
    }

    /// Parse a wire name, ignoring case.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }

    /// Resolved outcomes are everything except `Pending`.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for SignalOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted trading decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Globally unique identifier
    pub id: String,
    /// When the decision was taken
    pub timestamp: DateTime<Utc>,
    /// Subject symbol (e.g. "BTC")
    pub symbol: String,
    /// Direction of the decision
    pub decision_type: DecisionType,
    /// Confidence in [0.0, 1.0]
    pub confidence: f64,
    /// Free-text rationale
    pub reasoning: String,
    /// Market state at decision time
    #[serde(default)]
    pub market_snapshot: MarketSnapshot,
    /// Resolution, PENDING until updated
    #[serde(default)]
    pub outcome: SignalOutcome,
    /// Measured results, set with the outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Option<PerformanceMetrics>,
    /// Signature embedding, absent until embedded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl SignalRecord {
    /// Create a new pending signal with a fresh id, stamped now.
    pub fn new(
        symbol: impl Into<String>,
        decision_type: DecisionType,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            symbol: symbol.into(),
            decision_type,
            confidence,
            reasoning: reasoning.into(),
            market_snapshot: MarketSnapshot::new(),
            outcome: SignalOutcome::Pending,
            performance_metrics: None,
            embedding: None,
        }
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the decision time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a market snapshot.
    pub fn with_market_snapshot(mut self, snapshot: MarketSnapshot) -> Self {
        self.market_snapshot = snapshot;
        self
    }

    /// Set the outcome.
    pub fn with_outcome(mut self, outcome: SignalOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Attach performance metrics.
    pub fn with_performance_metrics(mut self, metrics: PerformanceMetrics) -> Self {
        self.performance_metrics = Some(metrics);
        self
    }

    /// Attach a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Text used to embed this signal: `"{symbol} {decision_type} {reasoning}"`.
    pub fn signature(&self) -> String {
        signature_text(&self.symbol, self.decision_type, &self.reasoning)
    }

    /// Only signals with an embedding take part in similarity search.
    pub fn is_indexable(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Validate the invariants checked before any persistence attempt.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Signal id cannot be empty".to_string());
        }
        validate_confidence(self.confidence)?;
        if let Some(embedding) = &self.embedding {
            if embedding.is_empty() {
                return Err("Signal embedding cannot be empty when present".to_string());
            }
            if embedding.iter().any(|v| !v.is_finite()) {
                return Err("Signal embedding contains non-finite values".to_string());
            }
        }
        if let Some(metrics) = &self.performance_metrics {
            if let Some((key, _)) = metrics.iter().find(|(_, v)| !v.is_finite()) {
                return Err(format!("Performance metric '{}' is not finite", key));
            }
        }
        Ok(())
    }
}

/// Build the text signature shared by stored signals and queries.
pub fn signature_text(symbol: &str, decision_type: DecisionType, reasoning: &str) -> String {
    format!("{} {} {}", symbol, decision_type.as_str(), reasoning)
}

/// Confidence must be a finite number in [0.0, 1.0].
pub fn validate_confidence(confidence: f64) -> Result<(), String> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            confidence
        ));
    }
    Ok(())
}

/// Query used for similarity lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalQuery {
    /// Subject symbol
    pub symbol: String,
    /// Direction of the decision
    pub decision_type: DecisionType,
    /// Free-text rationale
    pub reasoning: String,
}

impl SignalQuery {
    /// Query for similar decisions.
    pub fn new(
        symbol: impl Into<String>,
        decision_type: DecisionType,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            decision_type,
            reasoning: reasoning.into(),
        }
    }

    /// Text embedded for the lookup.
    pub fn signature(&self) -> String {
        signature_text(&self.symbol, self.decision_type, &self.reasoning)
    }
}
