//! SQLite implementation of the SignalRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::{bytes_to_embedding, embedding_to_bytes, format_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    DecisionType, ImprovementAction, ImprovementType, PerformanceMap, PerformanceMetrics,
    SignalOutcome, SignalRecord,
};
use crate::domain::ports::SignalRepository;

/// SQLite implementation of the signal repository.
#[derive(Clone)]
pub struct SqliteSignalRepository {
    pool: SqlitePool,
}

impl SqliteSignalRepository {
    /// Repository over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalRepository for SqliteSignalRepository {
    async fn upsert_signal(&self, signal: &SignalRecord) -> DomainResult<()> {
        let snapshot_json = serde_json::to_string(&signal.market_snapshot)?;
        let metrics_json = signal
            .performance_metrics
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"INSERT INTO signals (id, timestamp, symbol, decision_type, confidence, reasoning,
               market_snapshot, outcome, performance_metrics, embedding)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   timestamp = excluded.timestamp,
                   symbol = excluded.symbol,
                   decision_type = excluded.decision_type,
                   confidence = excluded.confidence,
                   reasoning = excluded.reasoning,
                   market_snapshot = excluded.market_snapshot,
                   outcome = excluded.outcome,
                   performance_metrics = excluded.performance_metrics,
                   embedding = excluded.embedding"#
        )
        .bind(&signal.id)
        .bind(format_datetime(&signal.timestamp))
        .bind(&signal.symbol)
        .bind(signal.decision_type.as_str())
        .bind(signal.confidence)
        .bind(&signal.reasoning)
        .bind(&snapshot_json)
        .bind(signal.outcome.as_str())
        .bind(metrics_json)
        .bind(signal.embedding.as_deref().map(embedding_to_bytes))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_signals(&self) -> DomainResult<Vec<SignalRecord>> {
        let rows: Vec<SignalRow> = sqlx::query_as(
            "SELECT * FROM signals ORDER BY timestamp ASC, id ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn delete_signals_before(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM signals WHERE timestamp < ?")
            .bind(format_datetime(&cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn update_outcome(
        &self,
        id: &str,
        outcome: SignalOutcome,
        metrics: Option<&PerformanceMetrics>,
    ) -> DomainResult<()> {
        let metrics_json = metrics.map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            "UPDATE signals SET outcome = ?, performance_metrics = ? WHERE id = ?"
        )
        .bind(outcome.as_str())
        .bind(metrics_json)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SignalNotFound(id.to_string()));
        }

        Ok(())
    }

    async fn update_embedding(&self, id: &str, embedding: &[f32]) -> DomainResult<()> {
        let result = sqlx::query("UPDATE signals SET embedding = ? WHERE id = ?")
            .bind(embedding_to_bytes(embedding))
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SignalNotFound(id.to_string()));
        }

        Ok(())
    }

    async fn upsert_improvement(&self, action: &ImprovementAction) -> DomainResult<()> {
        let parameters_json = serde_json::to_string(&action.parameters)?;
        let before_json = serde_json::to_string(&action.performance_before)?;
        let after_json = action
            .performance_after
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"INSERT INTO improvements (id, timestamp, type, description, parameters,
               performance_before, performance_after)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   timestamp = excluded.timestamp,
                   type = excluded.type,
                   description = excluded.description,
                   parameters = excluded.parameters,
                   performance_before = excluded.performance_before,
                   performance_after = excluded.performance_after"#
        )
        .bind(&action.id)
        .bind(format_datetime(&action.timestamp))
        .bind(action.improvement_type.as_str())
        .bind(&action.description)
        .bind(&parameters_json)
        .bind(&before_json)
        .bind(after_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_improvements(&self) -> DomainResult<Vec<ImprovementAction>> {
        let rows: Vec<ImprovementRow> = sqlx::query_as(
            "SELECT * FROM improvements ORDER BY timestamp ASC, rowid ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn update_performance_after(
        &self,
        id: &str,
        performance_after: &PerformanceMap,
    ) -> DomainResult<()> {
        let after_json = serde_json::to_string(performance_after)?;

        let result = sqlx::query("UPDATE improvements SET performance_after = ? WHERE id = ?")
            .bind(&after_json)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ImprovementNotFound(id.to_string()));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SignalRow {
    id: String,
    timestamp: String,
    symbol: String,
    decision_type: String,
    confidence: f64,
    reasoning: String,
    market_snapshot: Option<String>,
    outcome: String,
    performance_metrics: Option<String>,
    embedding: Option<Vec<u8>>,
}

impl TryFrom<SignalRow> for SignalRecord {
    type Error = DomainError;

    fn try_from(row: SignalRow) -> Result<Self, Self::Error> {
        let decision_type = DecisionType::from_str(&row.decision_type).ok_or_else(|| {
            DomainError::SerializationError(format!("Unknown decision type: {}", row.decision_type))
        })?;
        let outcome = SignalOutcome::from_str(&row.outcome).ok_or_else(|| {
            DomainError::SerializationError(format!("Unknown outcome: {}", row.outcome))
        })?;

        Ok(SignalRecord {
            id: row.id,
            timestamp: super::parse_datetime(&row.timestamp)?,
            symbol: row.symbol,
            decision_type,
            confidence: row.confidence,
            reasoning: row.reasoning,
            market_snapshot: super::parse_json_or_default(row.market_snapshot)?,
            outcome,
            performance_metrics: super::parse_optional_json(row.performance_metrics)?,
            embedding: row
                .embedding
                .as_deref()
                .map(bytes_to_embedding)
                .transpose()?
                .filter(|e| !e.is_empty()),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ImprovementRow {
    id: String,
    timestamp: String,
    #[sqlx(rename = "type")]
    improvement_type: String,
    description: String,
    parameters: Option<String>,
    performance_before: Option<String>,
    performance_after: Option<String>,
}

impl TryFrom<ImprovementRow> for ImprovementAction {
    type Error = DomainError;

    fn try_from(row: ImprovementRow) -> Result<Self, Self::Error> {
        let improvement_type = ImprovementType::from_str(&row.improvement_type).ok_or_else(|| {
            DomainError::SerializationError(format!(
                "Unknown improvement type: {}",
                row.improvement_type
            ))
        })?;

        Ok(ImprovementAction {
            id: row.id,
            timestamp: super::parse_datetime(&row.timestamp)?,
            improvement_type,
            description: row.description,
            parameters: super::parse_json_or_default(row.parameters)?,
            performance_before: super::parse_json_or_default(row.performance_before)?,
            performance_after: super::parse_optional_json(row.performance_after)?,
        })
    }
}
