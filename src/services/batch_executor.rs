//! Concurrent Batch Executor
//!
//! Runs a batch's tasks in a bounded worker pool with per-task deadlines
//! and cooperative cancellation. Execution proceeds in retry rounds: every
//! non-success outcome goes through the tracker's retry decision, and
//! tasks with remaining budget are queued into the next round of the same
//! batch. The executor polls outstanding work at a short fixed interval so
//! deadline expiry is detected promptly even while other tasks run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::batch::{BatchResult, BatchStatus, TaskBatch};
use crate::models::task::Task;
use crate::services::dispatch::{Dispatcher, TaskOutcome};
use crate::services::tracker::{RetryDecision, TaskTracker};
use crate::utils::config::SchedulerConfig;
use crate::utils::error::{SchedulerError, SchedulerResult};

/// One in-flight submission.
struct Running {
    task: Task,
    handle: JoinHandle<SchedulerResult<TaskOutcome>>,
    started: Instant,
    cancel: CancellationToken,
}

/// Terminal outcome of one task after all rounds.
enum Settled {
    Completed(TaskOutcome),
    Failed(String),
}

/// Executes batches against a dispatcher, with the tracker as the source
/// of truth for status and retry accounting.
pub struct BatchExecutor {
    dispatcher: Arc<Dispatcher>,
    tracker: Arc<Mutex<TaskTracker>>,
    config: SchedulerConfig,
    /// Worker pool shared across all batches of a run
    pool: Arc<Semaphore>,
}

impl BatchExecutor {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        tracker: Arc<Mutex<TaskTracker>>,
        config: SchedulerConfig,
    ) -> Self {
        let pool = Arc::new(Semaphore::new(config.max_parallel.max(1)));
        Self {
            dispatcher,
            tracker,
            config,
            pool,
        }
    }

    /// Execute one batch to completion, including all retry rounds, and
    /// aggregate one terminal outcome per member task.
    pub async fn execute_batch(&self, batch: &mut TaskBatch) -> SchedulerResult<BatchResult> {
        let batch_started = Instant::now();
        batch.status = BatchStatus::InProgress;
        info!(batch_id = %batch.id, tasks = batch.len(), "batch started");

        let mut result = BatchResult::new(batch.id.clone());
        let mut settled: HashMap<String, Settled> = HashMap::new();

        // Tasks already terminal when the batch starts (blocked by the
        // coordinator, or skipped in an aborted run) are reported, not run.
        let mut queue: Vec<Task> = Vec::with_capacity(batch.len());
        {
            let tracker = self.tracker.lock().await;
            for task in &batch.tasks {
                let current = tracker.get(&task.id).cloned().unwrap_or_else(|| task.clone());
                if current.status.is_terminal() {
                    result.skipped.push(current.id.clone());
                } else {
                    queue.push(current);
                }
            }
        }

        // Retry rounds: repeat until no task needs retrying.
        while !queue.is_empty() {
            let retry_ids = self.run_round(std::mem::take(&mut queue), &mut settled).await?;
            let tracker = self.tracker.lock().await;
            for id in retry_ids {
                if let Some(task) = tracker.get(&id) {
                    queue.push(task.clone());
                }
            }
        }

        for (task_id, outcome) in settled {
            match outcome {
                Settled::Completed(outcome) => {
                    for file in outcome.modified_files {
                        result.record_modified_file(file);
                    }
                    result.completed.push(task_id);
                }
                Settled::Failed(error) => {
                    result.failed.push(task_id);
                    result.errors.push(error);
                }
            }
        }
        result.completed.sort();
        result.failed.sort();
        result.success = result.failed.is_empty();
        result.execution_time_ms = batch_started.elapsed().as_millis() as u64;

        batch.status = BatchStatus::Completed;
        info!(
            batch_id = %batch.id,
            completed = result.completed.len(),
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            "batch finished"
        );
        Ok(result)
    }

    /// Run one round: submit every queued task, poll until all settle,
    /// and return the ids queued for the next round.
    async fn run_round(
        &self,
        tasks: Vec<Task>,
        settled: &mut HashMap<String, Settled>,
    ) -> SchedulerResult<Vec<String>> {
        let mut running: Vec<Running> = Vec::with_capacity(tasks.len());
        for task in tasks {
            self.tracker.lock().await.mark_in_progress(&task.id)?;
            running.push(self.submit(task));
        }

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut retry_ids: Vec<String> = Vec::new();

        while !running.is_empty() {
            let mut outstanding = Vec::with_capacity(running.len());
            for entry in running {
                if entry.handle.is_finished() {
                    let outcome = match entry.handle.await {
                        Ok(outcome) => outcome,
                        Err(join_err) => Err(SchedulerError::execution(format!(
                            "worker for '{}' aborted: {}",
                            entry.task.id, join_err
                        ))),
                    };
                    self.settle(&entry.task, outcome, settled, &mut retry_ids)
                        .await?;
                } else if entry.started.elapsed() >= Duration::from_secs(entry.task.timeout_secs) {
                    // Deadline reached: signal cooperative cancellation,
                    // fire the abort hook, and record the timeout on our
                    // own clock whether or not the callee stops.
                    warn!(task_id = %entry.task.id, timeout_secs = entry.task.timeout_secs, "task deadline reached");
                    entry.cancel.cancel();
                    self.dispatcher.abort_task(&entry.task).await;
                    entry.handle.abort();
                    let timeout_err = SchedulerError::Timeout {
                        task_id: entry.task.id.clone(),
                        timeout_secs: entry.task.timeout_secs,
                    };
                    self.settle(&entry.task, Err(timeout_err), settled, &mut retry_ids)
                        .await?;
                } else {
                    outstanding.push(entry);
                }
            }
            running = outstanding;
            if !running.is_empty() {
                tokio::time::sleep(poll_interval).await;
            }
        }

        Ok(retry_ids)
    }

    /// Submit one task to the worker pool. The start time is recorded at
    /// submission; waiting for a pool slot counts against the deadline.
    fn submit(&self, task: Task) -> Running {
        let cancel = CancellationToken::new();
        let dispatcher = self.dispatcher.clone();
        let pool = self.pool.clone();
        let task_for_worker = task.clone();
        let worker_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let _permit = pool
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::Cancelled)?;
            dispatcher.dispatch(&task_for_worker, worker_cancel).await
        });

        Running {
            task,
            handle,
            started: Instant::now(),
            cancel,
        }
    }

    /// Route one outcome through completion or the retry decision.
    async fn settle(
        &self,
        task: &Task,
        outcome: SchedulerResult<TaskOutcome>,
        settled: &mut HashMap<String, Settled>,
        retry_ids: &mut Vec<String>,
    ) -> SchedulerResult<()> {
        let mut tracker = self.tracker.lock().await;
        match outcome {
            Ok(outcome) => {
                tracker.mark_completed(
                    &task.id,
                    outcome.summary.clone(),
                    outcome.modified_files.clone(),
                )?;
                settled.insert(task.id.clone(), Settled::Completed(outcome));
            }
            Err(err) => {
                let message = err.to_string();
                if !err.is_retryable() {
                    // Resolution and fix-contract violations are terminal.
                    tracker.mark_failed(&task.id, message.clone())?;
                    settled.insert(task.id.clone(), Settled::Failed(message));
                    return Ok(());
                }
                match tracker.increment_retry(&task.id, message.clone())? {
                    RetryDecision::Retry => retry_ids.push(task.id.clone()),
                    RetryDecision::NoRetry => {
                        settled.insert(task.id.clone(), Settled::Failed(message));
                    }
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
