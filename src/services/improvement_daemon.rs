//! Improvement scheduler background daemon.
//!
//! Runs the improvement scheduler on a fixed timer and whenever an outcome
//! update wakes it:
//! - On each timer tick: full evaluation, then reconciliation of elapsed actions
//! - On wake-up: evaluation guarded by the check interval
//!
//! Scheduler errors are logged and counted; they never stop the daemon.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::time::{interval_at, Instant};

use super::improvement_scheduler::{EvaluationOutcome, ImprovementScheduler};
use crate::domain::ports::SignalRepository;

/// Configuration for the improvement daemon.
#[derive(Debug, Clone)]
pub struct ImprovementDaemonConfig {
    /// Interval between timer-driven evaluations.
    pub evaluation_interval: Duration,
    /// Whether to evaluate once on startup.
    pub run_on_startup: bool,
}

impl Default for ImprovementDaemonConfig {
    fn default() -> Self {
        Self {
            evaluation_interval: Duration::from_secs(6 * 60 * 60),
            run_on_startup: false,
        }
    }
}

impl ImprovementDaemonConfig {
    /// Create config with custom interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            evaluation_interval: interval,
            ..Default::default()
        }
    }
}

/// What caused an evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    Startup,
    Timer,
    OutcomeUpdate,
}

/// Event emitted by the improvement daemon.
#[derive(Debug, Clone)]
pub enum ImprovementDaemonEvent {
    /// Daemon started.
    Started,
    /// Evaluation completed.
    EvaluationCompleted {
        run_number: u64,
        trigger: RunTrigger,
        outcome: EvaluationOutcome,
    },
    /// Evaluation or reconciliation failed.
    RunFailed {
        run_number: u64,
        trigger: RunTrigger,
        error: String,
    },
    /// Improvement actions received their measured effect.
    Reconciled { count: usize },
    /// Daemon stopped.
    Stopped,
}

/// Status of the improvement daemon.
#[derive(Debug, Clone, Default)]
pub struct DaemonStatus {
    /// Whether the daemon is running.
    pub running: bool,
    /// Total evaluation runs.
    pub total_runs: u64,
    /// Successful runs.
    pub successful_runs: u64,
    /// Failed runs.
    pub failed_runs: u64,
    /// Total improvement actions emitted.
    pub actions_emitted: u64,
    /// Total improvement actions reconciled.
    pub actions_reconciled: u64,
    /// Last run time.
    pub last_run: Option<Instant>,
}

/// Handle to control the improvement daemon.
#[derive(Clone)]
pub struct DaemonHandle {
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
    status: Arc<RwLock<DaemonStatus>>,
}

impl DaemonHandle {
    /// Request the daemon to stop. Takes effect at the next wake-up, which
    /// this call triggers.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Check if stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    /// Get current daemon status.
    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }
}

/// Improvement scheduler background daemon.
pub struct ImprovementDaemon<R>
where
    R: SignalRepository + 'static,
{
    scheduler: Arc<ImprovementScheduler<R>>,
    config: ImprovementDaemonConfig,
    status: Arc<RwLock<DaemonStatus>>,
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl<R> ImprovementDaemon<R>
where
    R: SignalRepository + 'static,
{
    /// Create a new daemon for the given scheduler.
    pub fn new(scheduler: Arc<ImprovementScheduler<R>>, config: ImprovementDaemonConfig) -> Self {
        let wake = scheduler.wake_handle();
        Self {
            scheduler,
            config,
            status: Arc::new(RwLock::new(DaemonStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            wake,
        }
    }

    /// Get a handle to control the daemon.
    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            stop_flag: self.stop_flag.clone(),
            wake: self.wake.clone(),
            status: self.status.clone(),
        }
    }

    /// Spawn the daemon, returning a channel for events.
    ///
    /// Events are dropped rather than awaited when the channel is full, so a
    /// receiver that is never drained cannot stall the daemon.
    pub fn run(self) -> mpsc::Receiver<ImprovementDaemonEvent> {
        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            self.run_loop(tx).await;
        });

        rx
    }

    /// Main daemon loop.
    async fn run_loop(self, tx: mpsc::Sender<ImprovementDaemonEvent>) {
        self.scheduler.set_daemon_attached(true);
        self.status.write().await.running = true;
        let _ = tx.try_send(ImprovementDaemonEvent::Started);
        tracing::info!(
            interval_secs = self.config.evaluation_interval.as_secs(),
            "Improvement daemon started"
        );

        if self.config.run_on_startup {
            self.run_cycle(&tx, RunTrigger::Startup).await;
        }

        let period = self.config.evaluation_interval;
        let mut timer = interval_at(Instant::now() + period, period);

        while !self.stop_flag.load(Ordering::Acquire) {
            let trigger = tokio::select! {
                _ = timer.tick() => RunTrigger::Timer,
                _ = self.wake.notified() => RunTrigger::OutcomeUpdate,
            };

            if self.stop_flag.load(Ordering::Acquire) {
                break;
            }

            self.run_cycle(&tx, trigger).await;
        }

        self.scheduler.set_daemon_attached(false);
        self.status.write().await.running = false;
        let _ = tx.try_send(ImprovementDaemonEvent::Stopped);
        tracing::info!("Improvement daemon stopped");
    }

    /// Run a single evaluation cycle.
    async fn run_cycle(&self, tx: &mpsc::Sender<ImprovementDaemonEvent>, trigger: RunTrigger) {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_runs += 1;
            status.total_runs
        };

        let evaluation = match trigger {
            RunTrigger::OutcomeUpdate => self.scheduler.run_if_due().await,
            RunTrigger::Startup | RunTrigger::Timer => self.scheduler.trigger().await,
        };

        let reconciliation = match (&evaluation, trigger) {
            (Ok(_), RunTrigger::Startup | RunTrigger::Timer) => {
                Some(self.scheduler.reconcile(Utc::now()).await)
            }
            _ => None,
        };

        let mut status = self.status.write().await;
        status.last_run = Some(Instant::now());

        match evaluation {
            Ok(outcome) => {
                status.actions_emitted += outcome.actions().len() as u64;
                let _ = tx.try_send(ImprovementDaemonEvent::EvaluationCompleted {
                    run_number,
                    trigger,
                    outcome,
                });
            }
            Err(err) => {
                status.failed_runs += 1;
                tracing::error!(run_number, ?trigger, error = %err, "Improvement evaluation failed");
                let _ = tx.try_send(ImprovementDaemonEvent::RunFailed {
                    run_number,
                    trigger,
                    error: err.to_string(),
                });
                return;
            }
        }

        match reconciliation {
            Some(Err(err)) => {
                status.failed_runs += 1;
                tracing::error!(run_number, error = %err, "Improvement reconciliation failed");
                let _ = tx.try_send(ImprovementDaemonEvent::RunFailed {
                    run_number,
                    trigger,
                    error: err.to_string(),
                });
            }
            Some(Ok(count)) => {
                status.successful_runs += 1;
                status.actions_reconciled += count as u64;
                if count > 0 {
                    let _ = tx.try_send(ImprovementDaemonEvent::Reconciled { count });
                }
            }
            None => status.successful_runs += 1,
        }
    }

    /// Get current status.
    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }

    /// Get configuration.
    pub fn config(&self) -> &ImprovementDaemonConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::embeddings::HashingEmbeddingProvider;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteSignalRepository};
    use crate::domain::models::ImprovementConfig;
    use crate::services::signal_store::SignalStore;

    async fn scheduler() -> Arc<ImprovementScheduler<SqliteSignalRepository>> {
        let pool = create_migrated_test_pool().await.unwrap();
        let repository = Arc::new(SqliteSignalRepository::new(pool));
        let store = SignalStore::open(repository, Arc::new(HashingEmbeddingProvider::new(16)))
            .await
            .unwrap();
        Arc::new(ImprovementScheduler::new(Arc::new(store), ImprovementConfig::default()))
    }

    #[test]
    fn test_config_default() {
        let config = ImprovementDaemonConfig::default();
        assert_eq!(config.evaluation_interval, Duration::from_secs(21600));
        assert!(!config.run_on_startup);
    }

    #[test]
    fn test_daemon_status_default() {
        let status = DaemonStatus::default();
        assert!(!status.running);
        assert_eq!(status.total_runs, 0);
        assert!(status.last_run.is_none());
    }

    #[tokio::test]
    async fn test_startup_run_and_stop() {
        let scheduler = scheduler().await;
        let config = ImprovementDaemonConfig {
            run_on_startup: true,
            ..Default::default()
        };
        let daemon = ImprovementDaemon::new(scheduler, config);
        let handle = daemon.handle();
        let mut events = daemon.run();

        assert!(matches!(events.recv().await, Some(ImprovementDaemonEvent::Started)));
        match events.recv().await {
            Some(ImprovementDaemonEvent::EvaluationCompleted { run_number, trigger, .. }) => {
                assert_eq!(run_number, 1);
                assert_eq!(trigger, RunTrigger::Startup);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        handle.stop();
        assert!(matches!(events.recv().await, Some(ImprovementDaemonEvent::Stopped)));

        let status = handle.status().await;
        assert!(!status.running);
        assert_eq!(status.successful_runs, 1);
    }

    #[tokio::test]
    async fn test_outcome_update_wakes_daemon() {
        let scheduler = scheduler().await;
        let daemon = ImprovementDaemon::new(scheduler.clone(), ImprovementDaemonConfig::default());
        let handle = daemon.handle();
        let mut events = daemon.run();

        assert!(matches!(events.recv().await, Some(ImprovementDaemonEvent::Started)));

        scheduler.on_outcome_updated().await;
        match events.recv().await {
            Some(ImprovementDaemonEvent::EvaluationCompleted { trigger, outcome, .. }) => {
                assert_eq!(trigger, RunTrigger::OutcomeUpdate);
                assert_eq!(outcome, EvaluationOutcome::NotDue);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        handle.stop();
        assert!(matches!(events.recv().await, Some(ImprovementDaemonEvent::Stopped)));
    }
}
