//! Persistent Task Log
//!
//! Durable record of every known task, a bounded history of derivation
//! sessions, and a rolling summary. Writes are full-file JSON rewrites
//! after each mutation: simplicity over incremental-write performance.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::task::{Task, TaskStatus};
use crate::utils::error::SchedulerResult;

/// One task-derivation session: when a batch of tasks was ingested, from
/// which source, and what it contained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivationSession {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub counts_by_category: HashMap<String, usize>,
    pub counts_by_priority: HashMap<String, usize>,
    pub counts_by_role: HashMap<String, usize>,
    pub derived_ids: Vec<String>,
}

/// Rolling summary across all known tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskLogSummary {
    pub total_tasks: usize,
    pub completed: usize,
    pub failed: usize,
    /// Completed over terminal (completed + failed); 0.0 when nothing is
    /// terminal yet
    pub success_rate: f64,
    pub distinct_sources: Vec<String>,
    pub distinct_roles: Vec<String>,
}

impl TaskLogSummary {
    /// Recompute the summary from the current task set.
    pub fn compute(tasks: &[Task]) -> Self {
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let failed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count();
        let terminal = completed + failed;
        let success_rate = if terminal == 0 {
            0.0
        } else {
            completed as f64 / terminal as f64
        };

        let mut distinct_sources: Vec<String> = Vec::new();
        let mut distinct_roles: Vec<String> = Vec::new();
        for task in tasks {
            if !task.source_type.is_empty() && !distinct_sources.contains(&task.source_type) {
                distinct_sources.push(task.source_type.clone());
            }
            let role = task.target_role.to_string();
            if !distinct_roles.contains(&role) {
                distinct_roles.push(role);
            }
        }

        Self {
            total_tasks: tasks.len(),
            completed,
            failed,
            success_rate,
            distinct_sources,
            distinct_roles,
        }
    }
}

/// The persisted structure: tasks, session history, summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskLog {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub sessions: Vec<DerivationSession>,
    #[serde(default)]
    pub summary: TaskLogSummary,
}

/// Loads and saves the task log. A store without a path keeps everything
/// in memory, for embedding and for tests.
#[derive(Debug)]
pub struct TaskLogStore {
    path: Option<PathBuf>,
}

impl TaskLogStore {
    /// Store backed by a JSON file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// In-memory store; load returns an empty log and save is a no-op.
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    /// Load the log. A missing file means fresh state, not an error.
    pub fn load(&self) -> SchedulerResult<TaskLog> {
        let Some(path) = &self.path else {
            return Ok(TaskLog::default());
        };
        if !path.exists() {
            return Ok(TaskLog::default());
        }
        let content = fs::read_to_string(path)?;
        let log: TaskLog = serde_json::from_str(&content)?;
        Ok(log)
    }

    /// Full-file rewrite of the log.
    pub fn save(&self, log: &TaskLog) -> SchedulerResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(log)?;
        fs::write(path, content)?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
