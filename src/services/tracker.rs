//! Task Tracker
//!
//! Single owner of the mutable task table. All status transitions and
//! queries go through this type, never through raw map access, so the
//! status/timestamp invariants are enforced in one place. Every mutation
//! is followed by a synchronous full-file rewrite of the task log.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::models::task::{Task, TaskSpec, TaskStatus};
use crate::storage::task_log::{DerivationSession, TaskLog, TaskLogStore, TaskLogSummary};
use crate::utils::config::SchedulerConfig;
use crate::utils::error::{SchedulerError, SchedulerResult};

const EXCERPT_LEN: usize = 60;

/// Outcome of a retry request for a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Budget remains; the task is back to pending with `retry_count + 1`
    Retry,
    /// Budget exhausted; the task is terminally failed
    NoRetry,
}

/// Per-task row of the traceability report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceabilityRow {
    pub id: String,
    pub source_type: String,
    pub issue_excerpt: String,
    pub title: String,
    pub status: TaskStatus,
    pub result_excerpt: String,
    pub modified_files: Vec<String>,
}

/// Counts by status and source plus one row per task.
///
/// Invariant: `pending + in_progress + completed + failed + blocked +
/// skipped == total_tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceabilityReport {
    pub total_tasks: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub skipped: usize,
    pub counts_by_source: HashMap<String, usize>,
    pub rows: Vec<TraceabilityRow>,
}

/// Durable, queryable store of every task's lifecycle.
pub struct TaskTracker {
    tasks: HashMap<String, Task>,
    /// Ids in registration order, for stable iteration and reports
    order: Vec<String>,
    sessions: Vec<DerivationSession>,
    next_id: u64,
    store: TaskLogStore,
    config: SchedulerConfig,
}

impl TaskTracker {
    /// Create a tracker, loading any previously persisted state.
    pub fn new(store: TaskLogStore, config: SchedulerConfig) -> SchedulerResult<Self> {
        let log = store.load()?;
        let mut order = Vec::with_capacity(log.tasks.len());
        let mut tasks = HashMap::with_capacity(log.tasks.len());
        let mut next_id = 1;
        for task in log.tasks {
            if let Some(n) = task
                .id
                .strip_prefix("TASK-")
                .and_then(|s| s.parse::<u64>().ok())
            {
                next_id = next_id.max(n + 1);
            }
            order.push(task.id.clone());
            tasks.insert(task.id.clone(), task);
        }
        Ok(Self {
            tasks,
            order,
            sessions: log.sessions,
            next_id,
            store,
            config,
        })
    }

    /// In-memory tracker with default configuration, for tests and
    /// embedding.
    pub fn in_memory() -> Self {
        Self {
            tasks: HashMap::new(),
            order: Vec::new(),
            sessions: Vec::new(),
            next_id: 1,
            store: TaskLogStore::in_memory(),
            config: SchedulerConfig::default(),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register newly derived tasks: assign sequential ids, apply config
    /// defaults, and record one derivation session. Returns the registered
    /// tasks (with assigned ids) in order. The whole set is rejected when
    /// any spec carries an empty title; nothing is registered partially.
    pub fn register_tasks(
        &mut self,
        specs: Vec<TaskSpec>,
        source: &str,
    ) -> SchedulerResult<Vec<Task>> {
        for spec in &specs {
            if spec.title.trim().is_empty() {
                return Err(SchedulerError::validation("task title must not be empty"));
            }
        }

        let mut registered = Vec::with_capacity(specs.len());
        let mut counts_by_category: HashMap<String, usize> = HashMap::new();
        let mut counts_by_priority: HashMap<String, usize> = HashMap::new();
        let mut counts_by_role: HashMap<String, usize> = HashMap::new();
        let mut derived_ids = Vec::with_capacity(specs.len());

        for spec in specs {
            let id = format!("TASK-{:03}", self.next_id);
            self.next_id += 1;

            let mut task = Task::new(
                id.clone(),
                spec.title,
                spec.description,
                spec.category,
                spec.priority,
                spec.target_role,
                spec.max_retries
                    .unwrap_or(self.config.default_max_retries),
                spec.timeout_secs
                    .unwrap_or(self.config.default_timeout_secs),
            );
            task.affected_files = dedup_preserving_order(spec.affected_files);
            task.dependencies = spec.dependencies;
            task.source_issue = spec.source_issue;
            task.source_type = spec.source_type;

            *counts_by_category
                .entry(task.category.to_string())
                .or_insert(0) += 1;
            *counts_by_priority
                .entry(task.priority.to_string())
                .or_insert(0) += 1;
            *counts_by_role
                .entry(task.target_role.to_string())
                .or_insert(0) += 1;
            derived_ids.push(id.clone());

            self.order.push(id.clone());
            self.tasks.insert(id, task.clone());
            registered.push(task);
        }

        self.sessions.push(DerivationSession {
            timestamp: Utc::now(),
            source: source.to_string(),
            counts_by_category,
            counts_by_priority,
            counts_by_role,
            derived_ids,
        });
        // Bounded history: keep only the most recent sessions.
        let limit = self.config.session_history_limit;
        if self.sessions.len() > limit {
            let excess = self.sessions.len() - limit;
            self.sessions.drain(..excess);
        }

        info!(count = registered.len(), source = %source, "registered tasks");
        self.persist()?;
        Ok(registered)
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Pending -> InProgress, stamping `started_at`.
    pub fn mark_in_progress(&mut self, task_id: &str) -> SchedulerResult<()> {
        let task = self.get_mut(task_id)?;
        task.status = TaskStatus::InProgress;
        task.started_at = Some(Utc::now());
        self.persist()
    }

    /// Terminal success, stamping `completed_at`.
    pub fn mark_completed(
        &mut self,
        task_id: &str,
        result: impl Into<String>,
        modified_files: Vec<String>,
    ) -> SchedulerResult<()> {
        let task = self.get_mut(task_id)?;
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.result = Some(result.into());
        task.modified_files = dedup_preserving_order(modified_files);
        info!(task_id = %task_id, "task completed");
        self.persist()
    }

    /// Terminal failure.
    pub fn mark_failed(&mut self, task_id: &str, error_msg: impl Into<String>) -> SchedulerResult<()> {
        let task = self.get_mut(task_id)?;
        task.status = TaskStatus::Failed;
        task.completed_at = Some(Utc::now());
        task.error_message = Some(error_msg.into());
        error!(task_id = %task_id, "task failed");
        self.persist()
    }

    /// Dependency terminally failed and strict blocking is on.
    pub fn mark_blocked(&mut self, task_id: &str, reason: impl Into<String>) -> SchedulerResult<()> {
        let task = self.get_mut(task_id)?;
        task.status = TaskStatus::Blocked;
        task.error_message = Some(reason.into());
        self.persist()
    }

    /// Run aborted before this task got its turn.
    pub fn mark_skipped(&mut self, task_id: &str, reason: impl Into<String>) -> SchedulerResult<()> {
        let task = self.get_mut(task_id)?;
        task.status = TaskStatus::Skipped;
        task.error_message = Some(reason.into());
        self.persist()
    }

    /// Decide retry vs terminal failure after a non-success outcome.
    ///
    /// Below the budget: `retry_count + 1`, status back to pending, Retry.
    /// At the budget: status failed with the accumulated error, NoRetry.
    /// The `retry_count <= max_retries` invariant holds either way.
    pub fn increment_retry(
        &mut self,
        task_id: &str,
        error_msg: impl Into<String>,
    ) -> SchedulerResult<RetryDecision> {
        let task = self.get_mut(task_id)?;
        let error_msg = error_msg.into();
        if task.can_retry() {
            task.retry_count += 1;
            task.status = TaskStatus::Pending;
            task.error_message = Some(error_msg);
            let retry_count = task.retry_count;
            info!(task_id = %task_id, retry_count, "task queued for retry");
            self.persist()?;
            Ok(RetryDecision::Retry)
        } else {
            task.status = TaskStatus::Failed;
            task.completed_at = Some(Utc::now());
            task.error_message = Some(error_msg);
            error!(task_id = %task_id, "retry budget exhausted, task failed");
            self.persist()?;
            Ok(RetryDecision::NoRetry)
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    /// All tasks in registration order.
    pub fn all_tasks(&self) -> Vec<Task> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .cloned()
            .collect()
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.tasks_by_status(TaskStatus::Pending)
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    pub fn tasks_by_source(&self, source_type: &str) -> Vec<Task> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.source_type == source_type)
            .cloned()
            .collect()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    // ========================================================================
    // Reports
    // ========================================================================

    /// Counts by status/source plus one row per task.
    pub fn traceability_report(&self) -> TraceabilityReport {
        let mut report = TraceabilityReport {
            total_tasks: self.tasks.len(),
            pending: 0,
            in_progress: 0,
            completed: 0,
            failed: 0,
            blocked: 0,
            skipped: 0,
            counts_by_source: HashMap::new(),
            rows: Vec::with_capacity(self.tasks.len()),
        };

        for id in &self.order {
            let Some(task) = self.tasks.get(id) else {
                continue;
            };
            match task.status {
                TaskStatus::Pending => report.pending += 1,
                TaskStatus::InProgress => report.in_progress += 1,
                TaskStatus::Completed => report.completed += 1,
                TaskStatus::Failed => report.failed += 1,
                TaskStatus::Blocked => report.blocked += 1,
                TaskStatus::Skipped => report.skipped += 1,
            }
            if !task.source_type.is_empty() {
                *report
                    .counts_by_source
                    .entry(task.source_type.clone())
                    .or_insert(0) += 1;
            }
            report.rows.push(TraceabilityRow {
                id: task.id.clone(),
                source_type: task.source_type.clone(),
                issue_excerpt: excerpt(&task.source_issue),
                title: task.title.clone(),
                status: task.status,
                result_excerpt: excerpt(task.result.as_deref().unwrap_or("")),
                modified_files: task.modified_files.clone(),
            });
        }

        report
    }

    /// Human-readable rendering of the traceability report.
    pub fn render_report(&self) -> String {
        let report = self.traceability_report();
        let mut out = String::new();
        out.push_str("Task Traceability Report\n");
        out.push_str("========================\n");
        out.push_str(&format!(
            "Total: {} (pending {}, in_progress {}, completed {}, failed {}, blocked {}, skipped {})\n",
            report.total_tasks,
            report.pending,
            report.in_progress,
            report.completed,
            report.failed,
            report.blocked,
            report.skipped,
        ));
        let mut sources: Vec<_> = report.counts_by_source.iter().collect();
        sources.sort();
        for (source, count) in sources {
            out.push_str(&format!("  source {}: {}\n", source, count));
        }
        out.push('\n');
        for row in &report.rows {
            out.push_str(&format!(
                "{} [{}] {} ({})\n",
                row.id, row.status, row.title, row.source_type
            ));
            if !row.issue_excerpt.is_empty() {
                out.push_str(&format!("  issue:  {}\n", row.issue_excerpt));
            }
            if !row.result_excerpt.is_empty() {
                out.push_str(&format!("  result: {}\n", row.result_excerpt));
            }
            if !row.modified_files.is_empty() {
                out.push_str(&format!("  files:  {}\n", row.modified_files.join(", ")));
            }
        }
        out
    }

    /// Recent derivation sessions, oldest first.
    pub fn sessions(&self) -> &[DerivationSession] {
        &self.sessions
    }

    // ========================================================================
    // Pruning
    // ========================================================================

    /// Delete COMPLETED tasks older than `max_age` (by completion time).
    /// Returns how many were removed.
    pub fn prune_completed(&mut self, max_age: Duration) -> SchedulerResult<usize> {
        let cutoff = Utc::now() - max_age;
        let to_remove: Vec<String> = self
            .order
            .iter()
            .filter(|id| {
                self.tasks.get(*id).is_some_and(|t| {
                    t.status == TaskStatus::Completed
                        && t.completed_at.is_some_and(|at| at < cutoff)
                })
            })
            .cloned()
            .collect();

        for id in &to_remove {
            self.tasks.remove(id);
        }
        self.order.retain(|id| self.tasks.contains_key(id));

        if !to_remove.is_empty() {
            info!(count = to_remove.len(), "pruned completed tasks");
            self.persist()?;
        }
        Ok(to_remove.len())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn get_mut(&mut self, task_id: &str) -> SchedulerResult<&mut Task> {
        self.tasks
            .get_mut(task_id)
            .ok_or_else(|| SchedulerError::not_found(format!("task '{}'", task_id)))
    }

    fn persist(&self) -> SchedulerResult<()> {
        let tasks = self.all_tasks();
        let log = TaskLog {
            summary: TaskLogSummary::compute(&tasks),
            tasks,
            sessions: self.sessions.clone(),
        };
        self.store.save(&log)
    }
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= EXCERPT_LEN {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(EXCERPT_LEN).collect();
        format!("{}...", truncated)
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

// ============================================================================
// Tests
// ============================================================================
