//! Rolling-window performance aggregation over resolved signals.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::improvement::PerformanceMap;
use super::signal::{SignalOutcome, SignalRecord};

/// Start of a trailing window of `days` days ending at `now`.
///
/// Windows reaching past the representable range start at
/// `DateTime::<Utc>::MIN_UTC`, so they cover every record. Negative lengths
/// are treated as zero.
pub fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// End of a window of `days` days starting at `start`, or `None` if it lies
/// past the representable range.
pub fn window_end(start: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days.max(0)).and_then(|window| start.checked_add_signed(window))
}

/// Aggregate performance over a set of resolved signals.
///
/// An empty snapshot (no resolved signals in the window) is the neutral
/// result: every count is zero and every rate is zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// Resolved signals in the window
    pub total_signals: usize,
    /// Successes over resolved signals
    pub success_rate: f64,
    /// Mean confidence of resolved signals
    pub avg_confidence: f64,
    /// SUCCESS count
    pub successful_signals: usize,
    /// FAILURE count
    pub failed_signals: usize,
    /// PARTIAL count
    pub partial_signals: usize,
    /// Average of each performance-metric key, keyed as `avg_<key>`
    pub metric_averages: BTreeMap<String, f64>,
}

impl PerformanceSnapshot {
    /// Snapshot of an empty window.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether no resolved signal fell in the window.
    pub fn is_empty(&self) -> bool {
        self.total_signals == 0
    }

    /// Aggregate the resolved signals whose timestamp lies in `[start, end)`.
    pub fn between<'a, I>(signals: I, start: DateTime<Utc>, end: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a SignalRecord>,
    {
        Self::from_resolved(
            signals
                .into_iter()
                .filter(|s| s.timestamp >= start && s.timestamp < end),
        )
    }

    /// Aggregate the resolved signals from the last `window_days` days.
    pub fn window<'a, I>(signals: I, window_days: i64, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a SignalRecord>,
    {
        let cutoff = window_start(now, window_days);
        Self::from_resolved(signals.into_iter().filter(|s| s.timestamp >= cutoff))
    }

    fn from_resolved<'a, I>(signals: I) -> Self
    where
        I: IntoIterator<Item = &'a SignalRecord>,
    {
        let mut snapshot = Self::empty();
        let mut confidence_sum = 0.0;
        let mut metric_sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();

        for signal in signals.into_iter().filter(|s| s.outcome.is_resolved()) {
            snapshot.total_signals += 1;
            confidence_sum += signal.confidence;
            match signal.outcome {
                SignalOutcome::Success => snapshot.successful_signals += 1,
                SignalOutcome::Failure => snapshot.failed_signals += 1,
                SignalOutcome::Partial => snapshot.partial_signals += 1,
                SignalOutcome::Pending => {}
            }
            if let Some(metrics) = &signal.performance_metrics {
                for (key, value) in metrics {
                    let entry = metric_sums.entry(key.as_str()).or_insert((0.0, 0));
                    entry.0 += value;
                    entry.1 += 1;
                }
            }
        }

        if snapshot.total_signals == 0 {
            return snapshot;
        }

        let total = snapshot.total_signals as f64;
        snapshot.success_rate = snapshot.successful_signals as f64 / total;
        snapshot.avg_confidence = confidence_sum / total;
        snapshot.metric_averages = metric_sums
            .into_iter()
            .map(|(key, (sum, count))| (format!("avg_{}", key), sum / count as f64))
            .collect();

        snapshot
    }

    /// Flatten into the map form stored on improvement actions.
    ///
    /// An empty snapshot flattens to an empty map.
    pub fn to_map(&self) -> PerformanceMap {
        if self.is_empty() {
            return PerformanceMap::new();
        }

        let mut map = PerformanceMap::new();
        map.insert("total_signals".into(), self.total_signals as f64);
        map.insert("success_rate".into(), self.success_rate);
        map.insert("avg_confidence".into(), self.avg_confidence);
        map.insert("successful_signals".into(), self.successful_signals as f64);
        map.insert("failed_signals".into(), self.failed_signals as f64);
        map.insert("partial_signals".into(), self.partial_signals as f64);
        for (key, value) in &self.metric_averages {
            map.insert(key.clone(), *value);
        }
        map
    }
}
