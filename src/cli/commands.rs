//! Command handlers.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::output::{detail_table, list_table, output, render_list, truncate, CommandOutput};
use super::Commands;
use crate::domain::models::{
    window_start, DecisionType, ImprovementAction, PerformanceMetrics, PerformanceSnapshot,
    SignalOutcome, SignalQuery,
};
use crate::domain::ports::SignalRepository;
use crate::services::{DecisionMemory, EvaluationOutcome, NoActionReason, StoreStats};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Dispatch a parsed command against an open memory.
pub async fn execute<R: SignalRepository + 'static>(
    memory: &DecisionMemory<R>,
    command: Commands,
    json: bool,
) -> Result<()> {
    match command {
        Commands::Stats => handle_stats(memory, json).await,
        Commands::Metrics { days } => handle_metrics(memory, days, json).await,
        Commands::Similar {
            symbol,
            decision,
            reasoning,
            limit,
        } => handle_similar(memory, SignalQuery::new(symbol, decision, reasoning), limit, json).await,
        Commands::Outcome { id, outcome, metrics } => {
            handle_outcome(memory, id, outcome, metrics, json).await
        }
        Commands::Cleanup { older_than_days } => handle_cleanup(memory, older_than_days, json).await,
        Commands::Rebuild { backfill } => handle_rebuild(memory, backfill, json).await,
        Commands::Improve => handle_improve(memory, json).await,
        Commands::Reconcile => handle_reconcile(memory, json).await,
        Commands::Improvements { limit } => handle_improvements(memory, limit, json).await,
    }
}

impl CommandOutput for StoreStats {
    fn to_human(&self) -> String {
        let rows = [
            ("Signals", self.total_signals.to_string()),
            ("Embedded", self.embedded_signals.to_string()),
            ("Index size", self.index_size.to_string()),
            (
                "Index dimension",
                self.index_dimension.map_or_else(|| "-".to_string(), |d| d.to_string()),
            ),
            (
                "Index updated",
                self.last_index_update
                    .map_or_else(|| "never".to_string(), |t| t.format(TIME_FORMAT).to_string()),
            ),
            ("Improvements", self.improvements.to_string()),
            ("Embedding provider", self.embedding_provider.clone()),
        ];
        format!("Signal memory:\n{}", detail_table(&rows))
    }
}

/// Print store statistics.
pub async fn handle_stats<R: SignalRepository + 'static>(
    memory: &DecisionMemory<R>,
    json: bool,
) -> Result<()> {
    output(&memory.stats().await, json);
    Ok(())
}

/// Performance report for the `metrics` command.
#[derive(Debug, Serialize)]
pub struct MetricsOutput {
    /// Window length in days
    pub window_days: i64,
    /// Aggregates over the window
    #[serde(flatten)]
    pub snapshot: PerformanceSnapshot,
}

impl CommandOutput for MetricsOutput {
    fn to_human(&self) -> String {
        if self.snapshot.is_empty() {
            return format!("No resolved signals in the last {} days.", self.window_days);
        }
        let mut rows = vec![
            ("Resolved", self.snapshot.total_signals.to_string()),
            ("Success rate", format!("{:.1}%", self.snapshot.success_rate * 100.0)),
            ("Avg confidence", format!("{:.3}", self.snapshot.avg_confidence)),
            ("Successes", self.snapshot.successful_signals.to_string()),
            ("Failures", self.snapshot.failed_signals.to_string()),
            ("Partial", self.snapshot.partial_signals.to_string()),
        ];
        for (key, value) in &self.snapshot.metric_averages {
            rows.push((key.as_str(), format!("{value:.4}")));
        }
        format!(
            "Performance over the last {} days:\n{}",
            self.window_days,
            detail_table(&rows)
        )
    }
}

/// Print performance over the last `days` days.
pub async fn handle_metrics<R: SignalRepository + 'static>(
    memory: &DecisionMemory<R>,
    days: i64,
    json: bool,
) -> Result<()> {
    if days <= 0 {
        bail!("--days must be positive, got {days}");
    }
    let snapshot = memory.metrics(days).await;
    output(&MetricsOutput { window_days: days, snapshot }, json);
    Ok(())
}

/// One match in the `similar` listing.
#[derive(Debug, Serialize)]
pub struct SimilarRow {
    /// Matched signal id
    pub signal_id: String,
    /// Similarity to the query
    pub similarity: f32,
    /// Symbol of the match
    pub symbol: String,
    /// Decision of the match
    pub decision_type: DecisionType,
    /// Confidence recorded at decision time
    pub confidence: f64,
    /// Resolved outcome
    pub outcome: SignalOutcome,
    /// Reasoning text
    pub reasoning: String,
    /// Decision time
    pub timestamp: DateTime<Utc>,
}

/// Result of the `similar` command.
#[derive(Debug, Serialize)]
pub struct SimilarOutput {
    /// Matches, closest first
    pub matches: Vec<SimilarRow>,
}

impl CommandOutput for SimilarOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["similarity", "id", "symbol", "type", "conf", "outcome", "reasoning"]);
        for row in &self.matches {
            table.add_row(vec![
                format!("{:.3}", row.similarity),
                truncate(&row.signal_id, 12),
                row.symbol.clone(),
                row.decision_type.to_string(),
                format!("{:.2}", row.confidence),
                row.outcome.to_string(),
                truncate(&row.reasoning, 48),
            ]);
        }
        render_list("match", &table, self.matches.len())
    }
}

/// Print the signals most similar to a query.
pub async fn handle_similar<R: SignalRepository + 'static>(
    memory: &DecisionMemory<R>,
    query: SignalQuery,
    limit: usize,
    json: bool,
) -> Result<()> {
    let matches = memory
        .find_similar(&query, limit)
        .await
        .context("Failed to search similar signals")?;

    let matches = matches
        .into_iter()
        .map(|m| SimilarRow {
            signal_id: m.signal.id,
            similarity: m.similarity,
            symbol: m.signal.symbol,
            decision_type: m.signal.decision_type,
            confidence: m.signal.confidence,
            outcome: m.signal.outcome,
            reasoning: m.signal.reasoning,
            timestamp: m.signal.timestamp,
        })
        .collect();
    output(&SimilarOutput { matches }, json);
    Ok(())
}

/// Result of the `outcome` command.
#[derive(Debug, Serialize)]
pub struct OutcomeOutput {
    /// Updated signal id
    pub id: String,
    /// New outcome
    pub outcome: SignalOutcome,
    /// New performance metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Option<PerformanceMetrics>,
}

impl CommandOutput for OutcomeOutput {
    fn to_human(&self) -> String {
        format!("Signal {} marked {}", self.id, self.outcome)
    }
}

/// Resolve a stored signal.
pub async fn handle_outcome<R: SignalRepository + 'static>(
    memory: &DecisionMemory<R>,
    id: String,
    outcome: SignalOutcome,
    metrics: Vec<(String, f64)>,
    json: bool,
) -> Result<()> {
    let performance_metrics: Option<PerformanceMetrics> =
        (!metrics.is_empty()).then(|| metrics.into_iter().collect());

    memory
        .update_outcome(&id, outcome, performance_metrics.clone())
        .await
        .with_context(|| format!("Failed to update outcome for {id}"))?;

    output(
        &OutcomeOutput {
            id,
            outcome,
            performance_metrics,
        },
        json,
    );
    Ok(())
}

/// Result of the `cleanup` command.
#[derive(Debug, Serialize)]
pub struct CleanupOutput {
    /// Records older than this were removed
    pub cutoff: DateTime<Utc>,
    /// Number of records removed
    pub removed: usize,
}

impl CommandOutput for CleanupOutput {
    fn to_human(&self) -> String {
        format!(
            "Removed {} signal{} older than {}",
            self.removed,
            if self.removed == 1 { "" } else { "s" },
            self.cutoff.format(TIME_FORMAT)
        )
    }
}

/// Delete signals older than the given or configured age.
pub async fn handle_cleanup<R: SignalRepository + 'static>(
    memory: &DecisionMemory<R>,
    older_than_days: Option<i64>,
    json: bool,
) -> Result<()> {
    let days = match older_than_days.or(memory.retention().max_age_days) {
        Some(days) if days > 0 => days,
        Some(days) => bail!("--older-than-days must be positive, got {days}"),
        None => bail!("No --older-than-days given and no retention.max_age_days configured"),
    };

    let cutoff = window_start(Utc::now(), days);
    let removed = memory.cleanup(cutoff).await.context("Cleanup failed")?;
    output(&CleanupOutput { cutoff, removed }, json);
    Ok(())
}

/// Result of the `rebuild` command.
#[derive(Debug, Serialize)]
pub struct RebuildOutput {
    /// Records that received an embedding, when backfilling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backfilled: Option<usize>,
    /// Vectors in the rebuilt index
    pub index_size: usize,
}

impl CommandOutput for RebuildOutput {
    fn to_human(&self) -> String {
        match self.backfilled {
            Some(n) => format!("Embedded {n} signals; index holds {} vectors", self.index_size),
            None => format!("Index rebuilt with {} vectors", self.index_size),
        }
    }
}

/// Rebuild the index, optionally backfilling embeddings first.
pub async fn handle_rebuild<R: SignalRepository + 'static>(
    memory: &DecisionMemory<R>,
    backfill: bool,
    json: bool,
) -> Result<()> {
    let backfilled = if backfill {
        Some(memory.backfill_embeddings().await.context("Backfill failed")?)
    } else {
        None
    };
    let index_size = memory.rebuild_index().await.context("Index rebuild failed")?;
    output(&RebuildOutput { backfilled, index_size }, json);
    Ok(())
}

impl CommandOutput for EvaluationOutcome {
    fn to_human(&self) -> String {
        match self {
            Self::NotDue => "Evaluation not due yet.".to_string(),
            Self::Busy => "Another evaluation is in progress.".to_string(),
            Self::NoAction(NoActionReason::InsufficientData) => {
                "No action: not enough resolved signals in both windows.".to_string()
            }
            Self::NoAction(NoActionReason::NoRegression { drop }) => {
                format!("No action: success rate drop {drop:.3} is within tolerance.")
            }
            Self::NoAction(NoActionReason::InsufficientFailures { count }) => {
                format!("No action: only {count} recent failures.")
            }
            Self::ActionsEmitted { actions } => {
                format!("Regression detected.\n{}", improvements_table(actions))
            }
        }
    }
}

/// Run an improvement evaluation now.
pub async fn handle_improve<R: SignalRepository + 'static>(
    memory: &DecisionMemory<R>,
    json: bool,
) -> Result<()> {
    let outcome = memory
        .trigger_improvement()
        .await
        .context("Improvement evaluation failed")?;
    output(&outcome, json);
    Ok(())
}

/// Result of the `reconcile` command.
#[derive(Debug, Serialize)]
pub struct ReconcileOutput {
    /// Actions reconciled in this run
    pub reconciled: usize,
}

impl CommandOutput for ReconcileOutput {
    fn to_human(&self) -> String {
        format!("Reconciled {} improvement actions", self.reconciled)
    }
}

/// Reconcile improvement actions whose window has elapsed.
pub async fn handle_reconcile<R: SignalRepository + 'static>(
    memory: &DecisionMemory<R>,
    json: bool,
) -> Result<()> {
    let reconciled = memory
        .reconcile_improvements()
        .await
        .context("Reconciliation failed")?;
    output(&ReconcileOutput { reconciled }, json);
    Ok(())
}

/// Result of the `improvements` command.
#[derive(Debug, Serialize)]
pub struct ImprovementsOutput {
    /// Recorded actions in emission order
    pub actions: Vec<ImprovementAction>,
}

impl CommandOutput for ImprovementsOutput {
    fn to_human(&self) -> String {
        improvements_table(&self.actions)
    }
}

fn format_map_value(map: &crate::domain::models::PerformanceMap, key: &str) -> String {
    map.get(key).map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn improvements_table(actions: &[ImprovementAction]) -> String {
    let mut table = list_table(&["time", "type", "parameters", "rate before", "rate after"]);
    for action in actions {
        let parameters = action
            .parameters
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            action.timestamp.format(TIME_FORMAT).to_string(),
            action.improvement_type.to_string(),
            parameters,
            format_map_value(&action.performance_before, "success_rate"),
            action
                .performance_after
                .as_ref()
                .map_or_else(|| "pending".to_string(), |m| format_map_value(m, "success_rate")),
        ]);
    }
    render_list("improvement action", &table, actions.len())
}

/// List recorded improvement actions.
pub async fn handle_improvements<R: SignalRepository + 'static>(
    memory: &DecisionMemory<R>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut actions = memory.improvements().await;
    if let Some(limit) = limit {
        let skip = actions.len().saturating_sub(limit);
        actions.drain(..skip);
    }
    output(&ImprovementsOutput { actions }, json);
    Ok(())
}
