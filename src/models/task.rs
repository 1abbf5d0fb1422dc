//! Task Model
//!
//! The unit of remediation work: category, priority, target role,
//! dependencies, retry budget, deadline, and lifecycle fields.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// What kind of change a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Code,
    Test,
    Security,
    Docs,
    Config,
    Refactor,
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskCategory::Code => write!(f, "code"),
            TaskCategory::Test => write!(f, "test"),
            TaskCategory::Security => write!(f, "security"),
            TaskCategory::Docs => write!(f, "docs"),
            TaskCategory::Config => write!(f, "config"),
            TaskCategory::Refactor => write!(f, "refactor"),
        }
    }
}

/// Scheduling priority. Critical outranks high outranks medium outranks low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl TaskPriority {
    /// Stable sort key: critical=0 .. low=3. Ties are broken by insertion
    /// order (the sort must be stable).
    pub fn rank(&self) -> u8 {
        match self {
            TaskPriority::Critical => 0,
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Critical => write!(f, "critical"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::Low => write!(f, "low"),
        }
    }
}

/// Which capability provider a task is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRole {
    Coder,
    Tester,
    Security,
    Docs,
    Reviewer,
    Fix,
}

impl std::fmt::Display for TargetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetRole::Coder => write!(f, "coder"),
            TargetRole::Tester => write!(f, "tester"),
            TargetRole::Security => write!(f, "security"),
            TargetRole::Docs => write!(f, "docs"),
            TargetRole::Reviewer => write!(f, "reviewer"),
            TargetRole::Fix => write!(f, "fix"),
        }
    }
}

/// Lifecycle status of a task.
///
/// Pending -> InProgress -> Completed | Failed. A retry returns the task
/// to Pending with `retry_count` incremented. Blocked and Skipped are set
/// by the coordinator, never by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Blocked | TaskStatus::Skipped
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Blocked => write!(f, "blocked"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

// ============================================================================
// Task
// ============================================================================

/// One unit of remediation work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Stable human-readable id, assigned sequentially at ingestion
    /// (e.g. `TASK-001`)
    pub id: String,
    /// Short title
    pub title: String,
    /// Full description handed to the capability provider
    pub description: String,
    /// Kind of change
    pub category: TaskCategory,
    /// Scheduling priority
    pub priority: TaskPriority,
    /// Capability provider this task is routed to
    pub target_role: TargetRole,
    /// Relative paths this task is expected to touch (ordered, deduped)
    #[serde(default)]
    pub affected_files: Vec<String>,
    /// Ids of tasks that must be scheduled in an earlier batch
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Provenance: the issue text this task was derived from
    #[serde(default)]
    pub source_issue: String,
    /// Provenance: the subsystem that produced the task
    #[serde(default)]
    pub source_type: String,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Retry attempts consumed so far; never exceeds `max_retries`
    #[serde(default)]
    pub retry_count: u32,
    /// Retry budget
    pub max_retries: u32,
    /// Per-task deadline in seconds
    pub timeout_secs: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Result summary from the capability provider
    pub result: Option<String>,
    /// Terminal error message, if the task failed
    pub error_message: Option<String>,
    /// Files actually modified by this task
    #[serde(default)]
    pub modified_files: Vec<String>,
}

impl Task {
    /// Create a pending task with the given id and defaults for lifecycle
    /// fields. Callers normally go through `TaskTracker::register_tasks`,
    /// which assigns ids.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        category: TaskCategory,
        priority: TaskPriority,
        target_role: TargetRole,
        max_retries: u32,
        timeout_secs: u64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            category,
            priority,
            target_role,
            affected_files: Vec::new(),
            dependencies: Vec::new(),
            source_issue: String::new(),
            source_type: String::new(),
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries,
            timeout_secs,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
            modified_files: Vec::new(),
        }
    }

    /// True iff every dependency id is contained in `scheduled_ids`.
    pub fn is_ready(&self, scheduled_ids: &HashSet<String>) -> bool {
        self.dependencies
            .iter()
            .all(|dep| scheduled_ids.contains(dep))
    }

    /// True iff the retry budget is not exhausted.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Input for registering a new task with the tracker. The tracker assigns
/// the id and lifecycle fields.
#[derive(Debug, Clone, Default)]
pub struct TaskSpec {
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    pub priority: TaskPriority,
    pub target_role: TargetRole,
    pub affected_files: Vec<String>,
    /// Dependencies given as ids of previously registered tasks
    pub dependencies: Vec<String>,
    pub source_issue: String,
    pub source_type: String,
    /// Override for the configured default retry budget
    pub max_retries: Option<u32>,
    /// Override for the configured default deadline
    pub timeout_secs: Option<u64>,
}

impl Default for TaskCategory {
    fn default() -> Self {
        TaskCategory::Code
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

impl Default for TargetRole {
    fn default() -> Self {
        TargetRole::Coder
    }
}

// ============================================================================
// Tests
// ============================================================================
