//! External Tracking Sync
//!
//! Optional add-on that mirrors task state into a third-party tracker.
//! Strictly fire-and-forget: failures are logged and never block core
//! scheduling.

use async_trait::async_trait;
use tracing::warn;

use crate::models::task::Task;
use crate::utils::error::SchedulerResult;

/// Mirror of task state in an external tracker.
#[async_trait]
pub trait ExternalTrackerSync: Send + Sync {
    /// Create or update the external record for a task.
    async fn upsert_task(&self, task: &Task) -> SchedulerResult<()>;

    /// Append a resolution comment to the external record.
    async fn append_resolution(&self, task: &Task, comment: &str) -> SchedulerResult<()>;
}

/// Push a task's terminal state to the external tracker, swallowing
/// failures with a warning.
pub async fn sync_terminal_state(sync: &dyn ExternalTrackerSync, task: &Task) {
    if let Err(err) = sync.upsert_task(task).await {
        warn!(task_id = %task.id, error = %err, "external tracker upsert failed");
        return;
    }
    let comment = match (&task.result, &task.error_message) {
        (Some(result), _) => result.clone(),
        (None, Some(error)) => error.clone(),
        (None, None) => return,
    };
    if let Err(err) = sync.append_resolution(task, &comment).await {
        warn!(task_id = %task.id, error = %err, "external tracker comment failed");
    }
}
