//! Regression detection and improvement action emission.
//!
//! The scheduler compares a recent performance window against a longer
//! baseline window. When the success rate has dropped by more than the
//! configured threshold and enough high-impact failures back that up, it
//! emits improvement actions and records them in the signal store.
//!
//! Evaluation is non-reentrant: a request that arrives while another
//! evaluation is running returns [`EvaluationOutcome::Busy`].

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::signal_store::SignalStore;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    window_end, window_start, ActionParameters, ImprovementAction, ImprovementConfig,
    ImprovementType, PerformanceSnapshot, SignalOutcome,
};
use crate::domain::ports::SignalRepository;

/// Why an evaluation emitted nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoActionReason {
    /// One of the windows holds no resolved signals.
    InsufficientData,
    /// The success rate did not drop by more than the threshold.
    NoRegression { drop: f64 },
    /// Too few failures in the recent window to act on.
    InsufficientFailures { count: usize },
}

/// Result of one scheduler request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// The elapsed-interval guard has not passed yet.
    NotDue,
    /// Another evaluation is in progress.
    Busy,
    NoAction(NoActionReason),
    ActionsEmitted { actions: Vec<ImprovementAction> },
}

impl EvaluationOutcome {
    /// Actions emitted by this evaluation, empty for any other outcome.
    pub fn actions(&self) -> &[ImprovementAction] {
        match self {
            Self::ActionsEmitted { actions } => actions,
            _ => &[],
        }
    }
}

/// Detects performance regressions and emits improvement actions.
pub struct ImprovementScheduler<R: SignalRepository> {
    store: Arc<SignalStore<R>>,
    config: ImprovementConfig,
    last_check: Mutex<Instant>,
    evaluating: Mutex<()>,
    wake: Arc<Notify>,
    daemon_attached: AtomicBool,
}

impl<R: SignalRepository> ImprovementScheduler<R> {
    /// Scheduler over `store`; the interval starts now.
    pub fn new(store: Arc<SignalStore<R>>, config: ImprovementConfig) -> Self {
        Self {
            store,
            config,
            last_check: Mutex::new(Instant::now()),
            evaluating: Mutex::new(()),
            wake: Arc::new(Notify::new()),
            daemon_attached: AtomicBool::new(false),
        }
    }

    /// Active regression settings.
    pub fn config(&self) -> &ImprovementConfig {
        &self.config
    }

    /// The signal store evaluated.
    pub fn store(&self) -> &Arc<SignalStore<R>> {
        &self.store
    }

    pub(crate) fn wake_handle(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub(crate) fn set_daemon_attached(&self, attached: bool) {
        self.daemon_attached.store(attached, Ordering::Release);
    }

    /// React to a resolved outcome.
    ///
    /// With a daemon running this only wakes it; otherwise the guarded
    /// evaluation runs inline. Failures are logged, never returned.
    pub async fn on_outcome_updated(&self) {
        if self.daemon_attached.load(Ordering::Acquire) {
            self.wake.notify_one();
            return;
        }

        if let Err(err) = self.run_if_due().await {
            tracing::warn!(error = %err, "Improvement check after outcome update failed");
        }
    }

    /// Evaluate only if the check interval has elapsed since the last check.
    pub async fn run_if_due(&self) -> DomainResult<EvaluationOutcome> {
        {
            let mut last_check = self.last_check.lock().await;
            let interval = std::time::Duration::from_secs(self.config.check_interval_secs);
            if last_check.elapsed() < interval {
                return Ok(EvaluationOutcome::NotDue);
            }
            *last_check = Instant::now();
        }
        self.evaluate_at(Utc::now()).await
    }

    /// Evaluate now, ignoring the interval guard.
    pub async fn trigger(&self) -> DomainResult<EvaluationOutcome> {
        *self.last_check.lock().await = Instant::now();
        self.evaluate_at(Utc::now()).await
    }

    /// Evaluate the windows ending at `now`.
    pub async fn evaluate_at(&self, now: DateTime<Utc>) -> DomainResult<EvaluationOutcome> {
        let Ok(_guard) = self.evaluating.try_lock() else {
            tracing::debug!("Improvement evaluation already running");
            return Ok(EvaluationOutcome::Busy);
        };
        // actions are persisted with microsecond precision
        let now = now.trunc_subsecs(6);

        let recent = self.store.metrics_at(self.config.recent_window_days, now).await;
        let baseline = self.store.metrics_at(self.config.baseline_window_days, now).await;

        if recent.is_empty() || baseline.is_empty() {
            tracing::debug!("Not enough resolved signals to evaluate");
            return Ok(EvaluationOutcome::NoAction(NoActionReason::InsufficientData));
        }

        let drop = baseline.success_rate - recent.success_rate;
        if drop <= self.config.drop_threshold {
            tracing::debug!(drop, "No performance regression");
            return Ok(EvaluationOutcome::NoAction(NoActionReason::NoRegression { drop }));
        }

        let cutoff = window_start(now, self.config.recent_window_days);
        let failure_confidences: Vec<f64> = self
            .store
            .with_records(|records| {
                records
                    .iter()
                    .filter(|r| r.outcome == SignalOutcome::Failure && r.timestamp >= cutoff)
                    .map(|r| r.confidence)
                    .collect()
            })
            .await;

        let count = failure_confidences.len();
        if count <= self.config.min_failures {
            tracing::debug!(drop, failures = count, "Regression without enough failures");
            return Ok(EvaluationOutcome::NoAction(NoActionReason::InsufficientFailures { count }));
        }

        let actions = self.build_actions(&recent, &failure_confidences, drop, now);
        self.store.record_improvements(&actions).await?;

        tracing::info!(
            drop,
            failures = count,
            recent_success_rate = recent.success_rate,
            baseline_success_rate = baseline.success_rate,
            actions = actions.len(),
            "Performance regression detected; emitted improvement actions"
        );

        Ok(EvaluationOutcome::ActionsEmitted { actions })
    }

    fn build_actions(
        &self,
        recent: &PerformanceSnapshot,
        failure_confidences: &[f64],
        drop: f64,
        now: DateTime<Utc>,
    ) -> Vec<ImprovementAction> {
        let performance_before = recent.to_map();
        let mut actions = Vec::with_capacity(2);

        let avg_failure_confidence =
            failure_confidences.iter().sum::<f64>() / failure_confidences.len() as f64;

        if avg_failure_confidence > self.config.high_confidence_threshold {
            let new_threshold = avg_failure_confidence + self.config.threshold_step;
            let mut params = ActionParameters::new();
            params.insert("new_threshold".into(), json!(new_threshold));
            params.insert("old_threshold".into(), json!(self.config.high_confidence_threshold));

            actions.push(
                ImprovementAction::new(
                    ImprovementType::ConfidenceThreshold,
                    format!(
                        "Raise confidence threshold to {:.2}: recent failures averaged {:.2} confidence",
                        new_threshold, avg_failure_confidence
                    ),
                    params,
                    performance_before.clone(),
                )
                .with_timestamp(now),
            );
        }

        let mut params = ActionParameters::new();
        params.insert(
            "adjustment_factor".into(),
            json!(self.config.context_adjustment_factor),
        );
        actions.push(
            ImprovementAction::new(
                ImprovementType::ContextWeighting,
                format!(
                    "Reduce historical context weighting after success rate fell by {:.2}",
                    drop
                ),
                params,
                performance_before,
            )
            .with_timestamp(now),
        );

        actions
    }

    /// Fill `performance_after` for every action whose reconciliation window
    /// has fully elapsed. Returns the number of actions reconciled.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let window_days = self.config.reconcile_window_days;
        let due: Vec<(ImprovementAction, DateTime<Utc>)> = self
            .store
            .improvements()
            .await
            .into_iter()
            .filter(|a| !a.is_reconciled())
            .filter_map(|a| {
                let end = window_end(a.timestamp, window_days)?;
                (end <= now).then_some((a, end))
            })
            .collect();

        for (action, end) in &due {
            let after = self.store.metrics_between(action.timestamp, *end).await;
            self.store.set_performance_after(&action.id, after.to_map()).await?;
            tracing::info!(
                action_id = %action.id,
                improvement_type = %action.improvement_type,
                resolved_after = after.total_signals,
                "Reconciled improvement action"
            );
        }

        Ok(due.len())
    }
}
