//! Batch Model
//!
//! A batch groups tasks with no mutual dependency so they can run in
//! parallel. Batches are emitted in dependency order by the batch builder
//! and executed strictly sequentially.

use serde::{Deserialize, Serialize};

use crate::models::task::Task;

/// Aggregate status of a batch, mirroring its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    InProgress,
    Completed,
}

/// A group of tasks with no mutual dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBatch {
    /// Batch id (e.g. `batch-1`)
    pub id: String,
    /// Member tasks, in priority order
    pub tasks: Vec<Task>,
    /// Monotonically increasing position in the plan (0-based)
    pub priority_order: usize,
    pub status: BatchStatus,
    /// Ids that were force-scheduled to break a dependency cycle.
    /// Non-empty means the plan contains an anomaly the caller should see.
    #[serde(default)]
    pub forced_task_ids: Vec<String>,
}

impl TaskBatch {
    pub fn new(priority_order: usize, tasks: Vec<Task>) -> Self {
        Self {
            id: format!("batch-{}", priority_order + 1),
            tasks,
            priority_order,
            status: BatchStatus::Pending,
            forced_task_ids: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }
}

/// Outcome of executing one batch: one terminal result per member task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: String,
    /// True iff no member task ended failed
    pub success: bool,
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    /// Wall time for the whole batch call, in milliseconds
    pub execution_time_ms: u64,
    /// Union of `modified_files` across member tasks
    pub modified_files: Vec<String>,
    /// Error messages from terminal failures only
    pub errors: Vec<String>,
}

impl BatchResult {
    pub fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            success: true,
            completed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            execution_time_ms: 0,
            modified_files: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Record a modified file, preserving first-seen order without duplicates.
    pub fn record_modified_file(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.modified_files.contains(&path) {
            self.modified_files.push(path);
        }
    }
}
