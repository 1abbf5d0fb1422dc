//! Run Coordinator
//!
//! Drives one scheduling run end to end: register derived tasks, build
//! the batch plan, execute batches strictly sequentially, and aggregate
//! the overall verdict. Escalation and the dependency-strictness policy
//! live here, not in the executor.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::batch::BatchResult;
use crate::models::task::{TaskPriority, TaskSpec, TaskStatus};
use crate::services::batch_builder::BatchBuilder;
use crate::services::batch_executor::BatchExecutor;
use crate::services::dispatch::Dispatcher;
use crate::services::sync::{sync_terminal_state, ExternalTrackerSync};
use crate::services::tracker::TaskTracker;
use crate::utils::config::SchedulerConfig;
use crate::utils::error::SchedulerResult;

/// Aggregate outcome of one run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// True iff every registered task ended COMPLETED
    pub success: bool,
    pub batch_results: Vec<BatchResult>,
    /// Union of modified files across all batches, first-seen order
    pub modified_files: Vec<String>,
    /// Cycle-break anomalies surfaced by the planner
    pub forced_task_ids: Vec<String>,
    /// Whether remaining batches were aborted after a critical failure
    pub aborted: bool,
}

/// Coordinates tracker, planner, and executor for whole runs.
pub struct RunCoordinator {
    tracker: Arc<Mutex<TaskTracker>>,
    executor: BatchExecutor,
    config: SchedulerConfig,
    external_sync: Option<Arc<dyn ExternalTrackerSync>>,
}

impl RunCoordinator {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        tracker: Arc<Mutex<TaskTracker>>,
        config: SchedulerConfig,
    ) -> Self {
        let executor = BatchExecutor::new(dispatcher, tracker.clone(), config.clone());
        Self {
            tracker,
            executor,
            config,
            external_sync: None,
        }
    }

    /// Attach an optional external tracker mirror.
    pub fn with_external_sync(mut self, sync: Arc<dyn ExternalTrackerSync>) -> Self {
        self.external_sync = Some(sync);
        self
    }

    pub fn tracker(&self) -> &Arc<Mutex<TaskTracker>> {
        &self.tracker
    }

    /// Register newly derived tasks and execute them to completion.
    pub async fn run(&self, specs: Vec<TaskSpec>, source: &str) -> SchedulerResult<RunResult> {
        let tasks = self
            .tracker
            .lock()
            .await
            .register_tasks(specs, source)?;
        let run_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();

        let plan = BatchBuilder::build(tasks);
        info!(
            batches = plan.batches.len(),
            tasks = run_ids.len(),
            forced = plan.forced_task_ids.len(),
            "run planned"
        );

        let mut result = RunResult {
            success: true,
            batch_results: Vec::with_capacity(plan.batches.len()),
            modified_files: Vec::new(),
            forced_task_ids: plan.forced_task_ids.clone(),
            aborted: false,
        };

        let mut batches = plan.batches;
        for index in 0..batches.len() {
            if result.aborted {
                // A critical failure aborted the run; remaining tasks are
                // skipped, not silently dropped.
                let mut tracker = self.tracker.lock().await;
                for id in batches[index].task_ids() {
                    if tracker.get(&id).is_some_and(|t| !t.status.is_terminal()) {
                        tracker.mark_skipped(&id, "run aborted after critical failure")?;
                    }
                }
                continue;
            }

            if self.config.block_failed_dependents {
                self.block_failed_dependents(&batches[index].task_ids())
                    .await?;
            }

            let batch_result = self.executor.execute_batch(&mut batches[index]).await?;

            if self.config.abort_on_critical {
                let tracker = self.tracker.lock().await;
                let critical_failure = batch_result.failed.iter().any(|id| {
                    tracker
                        .get(id)
                        .is_some_and(|t| t.priority == TaskPriority::Critical)
                });
                if critical_failure {
                    warn!(batch_id = %batch_result.batch_id, "critical task failed, aborting remaining batches");
                    result.aborted = true;
                }
            }

            self.mirror_terminal_states(&batch_result).await;
            for file in &batch_result.modified_files {
                if !result.modified_files.contains(file) {
                    result.modified_files.push(file.clone());
                }
            }
            result.batch_results.push(batch_result);
        }

        // Overall verdict: every registered task must have completed.
        let tracker = self.tracker.lock().await;
        result.success = run_ids.iter().all(|id| {
            tracker
                .get(id)
                .is_some_and(|t| t.status == TaskStatus::Completed)
        });
        info!(success = result.success, aborted = result.aborted, "run finished");
        Ok(result)
    }

    /// Strict-mode pass: mark tasks BLOCKED when any dependency terminally
    /// failed. The permissive default never calls this.
    async fn block_failed_dependents(&self, batch_ids: &[String]) -> SchedulerResult<()> {
        let mut tracker = self.tracker.lock().await;
        for id in batch_ids {
            let Some(task) = tracker.get(id) else {
                continue;
            };
            let failed_dep = task.dependencies.iter().find(|dep| {
                tracker.get(dep).is_some_and(|d| {
                    matches!(d.status, TaskStatus::Failed | TaskStatus::Blocked)
                })
            });
            if let Some(dep) = failed_dep.cloned() {
                tracker.mark_blocked(id, format!("dependency '{}' failed", dep))?;
            }
        }
        Ok(())
    }

    /// Best-effort mirroring of terminal states into the external tracker.
    async fn mirror_terminal_states(&self, batch_result: &BatchResult) {
        let Some(sync) = &self.external_sync else {
            return;
        };
        let tracker = self.tracker.lock().await;
        for id in batch_result.completed.iter().chain(&batch_result.failed) {
            if let Some(task) = tracker.get(id) {
                sync_terminal_state(sync.as_ref(), task).await;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
