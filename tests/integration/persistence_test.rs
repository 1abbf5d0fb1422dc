//! Persistence Integration Tests
//!
//! Task log durability: state survives a tracker restart, sequential ids
//! resume past persisted tasks, reports reflect reloaded state, and
//! pruning rewrites the file.

use chrono::{Duration, Utc};
use tempfile::TempDir;

use taskmender::{
    SchedulerConfig, TargetRole, TaskCategory, TaskLogStore, TaskPriority, TaskSpec, TaskStatus,
    TaskTracker,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn log_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("state").join("task_log.json")
}

fn tracker_at(dir: &TempDir) -> TaskTracker {
    TaskTracker::new(TaskLogStore::new(log_path(dir)), SchedulerConfig::default()).unwrap()
}

fn spec(title: &str) -> TaskSpec {
    TaskSpec {
        title: title.to_string(),
        description: format!("do {}", title),
        category: TaskCategory::Code,
        priority: TaskPriority::Medium,
        target_role: TargetRole::Coder,
        source_type: "review".to_string(),
        ..TaskSpec::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let mut tracker = tracker_at(&dir);
        tracker
            .register_tasks(vec![spec("alpha"), spec("beta")], "review")
            .unwrap();
        tracker.mark_in_progress("TASK-001").unwrap();
        tracker
            .mark_completed("TASK-001", "done", vec!["src/a.js".to_string()])
            .unwrap();
    }

    let tracker = tracker_at(&dir);
    assert_eq!(tracker.task_count(), 2);

    let alpha = tracker.get("TASK-001").unwrap();
    assert_eq!(alpha.status, TaskStatus::Completed);
    assert_eq!(alpha.modified_files, vec!["src/a.js"]);
    assert!(alpha.completed_at.is_some());

    let beta = tracker.get("TASK-002").unwrap();
    assert_eq!(beta.status, TaskStatus::Pending);
}

#[test]
fn test_ids_resume_after_reload() {
    let dir = TempDir::new().unwrap();

    {
        let mut tracker = tracker_at(&dir);
        tracker
            .register_tasks(vec![spec("one"), spec("two"), spec("three")], "review")
            .unwrap();
    }

    let mut tracker = tracker_at(&dir);
    let registered = tracker.register_tasks(vec![spec("four")], "review").unwrap();
    assert_eq!(registered[0].id, "TASK-004");
}

#[test]
fn test_sessions_survive_restart() {
    let dir = TempDir::new().unwrap();

    {
        let mut tracker = tracker_at(&dir);
        tracker.register_tasks(vec![spec("a")], "review").unwrap();
        tracker
            .register_tasks(vec![spec("b"), spec("c")], "quality_gate")
            .unwrap();
    }

    let tracker = tracker_at(&dir);
    let sessions = tracker.sessions();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].source, "review");
    assert_eq!(sessions[1].source, "quality_gate");
    assert_eq!(sessions[1].derived_ids, vec!["TASK-002", "TASK-003"]);
}

#[test]
fn test_report_reflects_reloaded_state() {
    let dir = TempDir::new().unwrap();

    {
        let mut tracker = tracker_at(&dir);
        tracker
            .register_tasks(vec![spec("good"), spec("bad")], "review")
            .unwrap();
        tracker.mark_in_progress("TASK-001").unwrap();
        tracker.mark_completed("TASK-001", "ok", vec![]).unwrap();
        tracker.mark_in_progress("TASK-002").unwrap();
        tracker.mark_failed("TASK-002", "boom").unwrap();
    }

    let tracker = tracker_at(&dir);
    let report = tracker.traceability_report();
    assert_eq!(report.total_tasks, 2);
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);

    let rendered = tracker.render_report();
    assert!(rendered.contains("TASK-001"));
    assert!(rendered.contains("TASK-002"));
}

#[test]
fn test_prune_removes_old_completed_and_persists() {
    let dir = TempDir::new().unwrap();

    {
        let mut tracker = tracker_at(&dir);
        tracker
            .register_tasks(vec![spec("old done"), spec("fresh done"), spec("open")], "review")
            .unwrap();
        tracker.mark_in_progress("TASK-001").unwrap();
        tracker.mark_completed("TASK-001", "ok", vec![]).unwrap();
        tracker.mark_in_progress("TASK-002").unwrap();
        tracker.mark_completed("TASK-002", "ok", vec![]).unwrap();
    }

    // Backdate TASK-001's completion directly in the log file.
    let raw = std::fs::read_to_string(log_path(&dir)).unwrap();
    let mut log: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let old_stamp = (Utc::now() - Duration::days(30)).to_rfc3339();
    for task in log["tasks"].as_array_mut().unwrap() {
        if task["id"] == "TASK-001" {
            task["completed_at"] = serde_json::Value::String(old_stamp.clone());
        }
    }
    std::fs::write(log_path(&dir), serde_json::to_string_pretty(&log).unwrap()).unwrap();

    let mut tracker = tracker_at(&dir);
    let removed = tracker.prune_completed(Duration::days(7)).unwrap();
    assert_eq!(removed, 1);
    assert!(tracker.get("TASK-001").is_none());
    assert!(tracker.get("TASK-002").is_some());
    assert!(tracker.get("TASK-003").is_some());

    // The rewrite is durable.
    let tracker = tracker_at(&dir);
    assert_eq!(tracker.task_count(), 2);
}
