//! Dependency-Aware Batch Builder
//!
//! Turns a flat task list into an ordered sequence of batches such that
//! every task's dependencies land in an earlier batch. Cycles (and
//! dependencies on tasks outside the set) are resolved by force-scheduling
//! exactly one remaining task per stuck round, so planning always
//! terminates and the anomaly is surfaced instead of deadlocking.

use std::collections::HashSet;

use tracing::warn;

use crate::models::batch::TaskBatch;
use crate::models::task::Task;

/// The ordered batch plan plus any cycle-break anomalies.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    /// Batches in execution order
    pub batches: Vec<TaskBatch>,
    /// Ids that had to be force-scheduled to break a cycle
    pub forced_task_ids: Vec<String>,
}

impl BatchPlan {
    /// Total number of tasks across all batches.
    pub fn task_count(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }
}

/// Builds dependency-ordered batches from a flat task list.
pub struct BatchBuilder;

impl BatchBuilder {
    /// Build the batch plan.
    ///
    /// Readiness is computed against "scheduled in an earlier batch", not
    /// against runtime completion, which is why retries happen within a
    /// batch rather than by re-planning. Deterministic: the same input
    /// always yields the same partitioning.
    pub fn build(tasks: Vec<Task>) -> BatchPlan {
        if tasks.is_empty() {
            return BatchPlan {
                batches: Vec::new(),
                forced_task_ids: Vec::new(),
            };
        }

        // Stable sort by priority rank; ties keep insertion order.
        let mut remaining = tasks;
        remaining.sort_by_key(|t| t.priority.rank());

        let mut scheduled_ids: HashSet<String> = HashSet::new();
        let mut batches: Vec<TaskBatch> = Vec::new();
        let mut forced_task_ids: Vec<String> = Vec::new();

        while !remaining.is_empty() {
            let mut ready_idx: Vec<usize> = remaining
                .iter()
                .enumerate()
                .filter(|(_, t)| t.is_ready(&scheduled_ids))
                .map(|(i, _)| i)
                .collect();

            let mut forced_in_this_batch = Vec::new();
            if ready_idx.is_empty() {
                // Dependency cycle, or a dependency outside the set. Force
                // the first remaining task (priority-sorted order) so the
                // plan terminates; the anomaly is recorded on the batch.
                let forced = &remaining[0];
                warn!(
                    task_id = %forced.id,
                    "dependency cycle detected, force-scheduling to break deadlock"
                );
                forced_in_this_batch.push(forced.id.clone());
                ready_idx.push(0);
            }

            // Drain ready tasks, preserving the sorted order.
            let ready_set: HashSet<usize> = ready_idx.iter().copied().collect();
            let mut batch_tasks = Vec::with_capacity(ready_idx.len());
            let mut rest = Vec::with_capacity(remaining.len() - ready_idx.len());
            for (i, task) in remaining.into_iter().enumerate() {
                if ready_set.contains(&i) {
                    scheduled_ids.insert(task.id.clone());
                    batch_tasks.push(task);
                } else {
                    rest.push(task);
                }
            }
            remaining = rest;

            let mut batch = TaskBatch::new(batches.len(), batch_tasks);
            batch.forced_task_ids = forced_in_this_batch.clone();
            forced_task_ids.extend(forced_in_this_batch);
            batches.push(batch);
        }

        BatchPlan {
            batches,
            forced_task_ids,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
