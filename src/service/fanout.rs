//! Timeline fan-out worker
//!
//! Drains the `fanout_tasks` outbox: each task copies one post into the
//! timelines of its author's current followers. Creating a post wakes the
//! worker; a poll interval picks up retries and anything missed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Notify, watch};

use crate::config::FanoutConfig;
use crate::data::{Database, FanoutTask};
use crate::error::AppError;
use crate::metrics::{FANOUT_TASKS_TOTAL, TIMELINE_ROWS_DELIVERED_TOTAL};

/// Wake-up handle shared between post creation and the worker
#[derive(Debug, Clone, Default)]
pub struct FanoutSignal(Arc<Notify>);

impl FanoutSignal {
    /// Ask the worker to look at the outbox now
    ///
    /// A wake-up sent while the worker is busy is kept for its next wait.
    pub fn wake(&self) {
        self.0.notify_one();
    }

    async fn notified(&self) {
        self.0.notified().await;
    }
}

/// Worker tuning
#[derive(Debug, Clone, Copy)]
pub struct FanoutSettings {
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub max_attempts: i64,
    pub retry_backoff: chrono::Duration,
}

impl From<&FanoutConfig> for FanoutSettings {
    fn from(config: &FanoutConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            batch_size: config.batch_size,
            max_attempts: config.max_attempts,
            retry_backoff: chrono::Duration::seconds(config.retry_backoff_seconds),
        }
    }
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self::from(&FanoutConfig::default())
    }
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Tasks delivered and retired
    pub delivered: u64,
    /// Tasks that failed and were rescheduled or parked
    pub failed: u64,
    /// Timeline rows inserted
    pub timeline_rows: u64,
}

/// Background consumer of the fan-out outbox
pub struct FanoutWorker {
    db: Arc<Database>,
    signal: FanoutSignal,
    settings: FanoutSettings,
}

impl FanoutWorker {
    /// Create new fan-out worker
    pub fn new(db: Arc<Database>, signal: FanoutSignal, settings: FanoutSettings) -> Self {
        Self {
            db,
            signal,
            settings,
        }
    }

    /// Run until `shutdown` flips to `true`
    ///
    /// A pass in progress finishes before the worker stops.
    ///
    /// # Note
    /// This method runs indefinitely. Call in a spawned task.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            batch_size = self.settings.batch_size,
            "Fan-out worker started"
        );

        loop {
            tokio::select! {
                _ = self.signal.notified() => {}
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if let Err(error) = self.run_pending().await {
                tracing::error!(%error, "Fan-out pass failed");
            }
        }

        tracing::info!("Fan-out worker stopped");
    }

    /// Deliver every task that is currently due
    pub async fn run_pending(&self) -> Result<FanoutReport, AppError> {
        let mut report = FanoutReport::default();

        loop {
            let tasks = self
                .db
                .due_fanout_tasks(Utc::now(), self.settings.max_attempts, self.settings.batch_size)
                .await?;
            let claimed = tasks.len() as i64;

            for task in tasks {
                match self.db.deliver_fanout(&task).await {
                    Ok(rows) => {
                        report.delivered += 1;
                        report.timeline_rows += rows;
                        FANOUT_TASKS_TOTAL.with_label_values(&["delivered"]).inc();
                        TIMELINE_ROWS_DELIVERED_TOTAL.inc_by(rows);
                        tracing::debug!(
                            task_id = task.id,
                            post_id = task.post_id,
                            timeline_rows = rows,
                            "Post fanned out"
                        );
                    }
                    Err(error) => {
                        report.failed += 1;
                        FANOUT_TASKS_TOTAL.with_label_values(&["failed"]).inc();
                        self.reschedule(&task, &error).await?;
                    }
                }
            }

            if claimed < self.settings.batch_size {
                break;
            }
        }

        Ok(report)
    }

    async fn reschedule(&self, task: &FanoutTask, error: &AppError) -> Result<(), AppError> {
        let attempt = task.attempts + 1;
        let next_attempt_at = Utc::now() + self.settings.retry_backoff * attempt as i32;

        let attempts = self
            .db
            .record_fanout_failure(task.id, &error.to_string(), next_attempt_at)
            .await?;

        if attempts >= self.settings.max_attempts {
            tracing::error!(
                task_id = task.id,
                post_id = task.post_id,
                attempts,
                %error,
                "Fan-out task parked after repeated failures"
            );
        } else {
            tracing::warn!(
                task_id = task.id,
                post_id = task.post_id,
                attempts,
                %next_attempt_at,
                %error,
                "Fan-out failed; retry scheduled"
            );
        }

        Ok(())
    }
}
