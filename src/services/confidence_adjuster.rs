//! Confidence adjustment from historical context.

use crate::domain::models::HistoricalContext;

/// Largest absolute change applied to a confidence.
pub const MAX_ADJUSTMENT: f64 = 0.3;

const SUCCESS_SCALE: f64 = 0.3;
const SIMILARITY_CAP: f64 = 0.9;
const FULL_SAMPLE: f64 = 10.0;

/// Maps retrieved historical context to a bounded confidence delta.
///
/// The delta grows with how far the historical success rate sits from a
/// coin flip, weighted by how similar the matches are and how many there
/// were:
///
/// ```text
/// base       = (success_rate - 0.5) * 0.3
/// weight     = min(avg_similarity, 0.9) * min(total_similar / 10, 1.0)
/// adjustment = clamp(base * weight, -0.3, 0.3)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceAdjuster;

impl ConfidenceAdjuster {
    /// Adjuster with the default weighting.
    pub fn new() -> Self {
        Self
    }

    /// Signed adjustment for the given history, bounded to [-0.3, 0.3].
    pub fn adjustment(&self, context: &HistoricalContext) -> f64 {
        if context.total_similar == 0
            || !context.success_rate.is_finite()
            || !context.avg_similarity.is_finite()
        {
            return 0.0;
        }

        let base = (context.success_rate - 0.5) * SUCCESS_SCALE;
        let similarity = context.avg_similarity.clamp(0.0, SIMILARITY_CAP);
        let sample = (context.total_similar as f64 / FULL_SAMPLE).min(1.0);

        (base * similarity * sample).clamp(-MAX_ADJUSTMENT, MAX_ADJUSTMENT)
    }

    /// Returns `(adjustment, final_confidence)`.
    pub fn apply(&self, original: f64, context: &HistoricalContext) -> (f64, f64) {
        let adjustment = self.adjustment(context);
        let final_confidence = if original.is_finite() {
            (original + adjustment).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (adjustment, final_confidence)
    }
}
