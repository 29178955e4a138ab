//! Improvement action domain model.
//!
//! An improvement action records an adaptive behavior change emitted when a
//! performance regression is detected. Actions are immutable once created,
//! except for `performance_after`, which a later reconciliation pass fills in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Parameters attached to an improvement action.
pub type ActionParameters = serde_json::Map<String, serde_json::Value>;

/// Flattened performance snapshot (`success_rate`, `avg_confidence`, ...).
pub type PerformanceMap = BTreeMap<String, f64>;

/// Kind of adaptive change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementType {
    PromptAdjustment,
    ConfidenceThreshold,
    ContextWeighting,
    SignalFiltering,
}

impl ImprovementType {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PromptAdjustment => "prompt_adjustment",
            Self::ConfidenceThreshold => "confidence_threshold",
            Self::ContextWeighting => "context_weighting",
            Self::SignalFiltering => "signal_filtering",
        }
    }

    /// Parse a wire name, ignoring case.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "prompt_adjustment" => Some(Self::PromptAdjustment),
            "confidence_threshold" => Some(Self::ConfidenceThreshold),
            "context_weighting" => Some(Self::ContextWeighting),
            "signal_filtering" => Some(Self::SignalFiltering),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImprovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded adaptive behavior change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementAction {
    /// Unique identifier
    pub id: String,
    /// Emission time
    pub timestamp: DateTime<Utc>,
    /// Kind of change
    pub improvement_type: ImprovementType,
    /// Human-readable summary
    pub description: String,
    /// Parameters of the change
    pub parameters: ActionParameters,
    /// Snapshot of the recent window when the action was emitted
    pub performance_before: PerformanceMap,
    /// Measured after the reconciliation window has elapsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_after: Option<PerformanceMap>,
}

impl ImprovementAction {
    /// Create a new action stamped now with a fresh id.
    pub fn new(
        improvement_type: ImprovementType,
        description: impl Into<String>,
        parameters: ActionParameters,
        performance_before: PerformanceMap,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            improvement_type,
            description: description.into(),
            parameters,
            performance_before,
            performance_after: None,
        }
    }

    /// Set the emission time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Numeric parameter lookup.
    pub fn parameter_f64(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Whether `performance_after` has been measured.
    pub fn is_reconciled(&self) -> bool {
        self.performance_after.is_some()
    }
}
