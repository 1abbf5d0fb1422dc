//! Fix Contract Integration Tests
//!
//! Fix tasks against a real on-disk project: the corrected content must
//! land in exactly one known file and be verified by a re-read, and an
//! unusable provider response must fail the task without touching disk.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use taskmender::{
    CapabilityProvider, CapabilityResolver, Dispatcher, ProjectContext, RunCoordinator,
    SchedulerConfig, SchedulerResult, TargetRole, Task, TaskCategory, TaskPriority, TaskSpec,
    TaskStatus, TaskTracker,
};

// ============================================================================
// Helper Functions
// ============================================================================

/// Returns the same canned response for every call.
struct CannedProvider {
    response: String,
}

#[async_trait]
impl CapabilityProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn execute(
        &self,
        _task: &Task,
        _timeout: Duration,
        _cancel: CancellationToken,
    ) -> SchedulerResult<String> {
        Ok(self.response.clone())
    }
}

async fn project_with_file(dir: &TempDir, path: &str, content: &str) -> Arc<ProjectContext> {
    std::fs::write(dir.path().join(path), content).unwrap();
    let project = Arc::new(ProjectContext::new(dir.path(), "javascript"));
    project.insert_file(path, content).await;
    project
}

fn fix_coordinator(project: Arc<ProjectContext>, response: &str) -> RunCoordinator {
    let resolver = CapabilityResolver::new().register(
        TargetRole::Fix,
        Arc::new(CannedProvider {
            response: response.to_string(),
        }),
    );
    let dispatcher = Arc::new(Dispatcher::new(resolver, project));
    let tracker = Arc::new(Mutex::new(TaskTracker::in_memory()));
    let config = SchedulerConfig {
        poll_interval_ms: 20,
        ..SchedulerConfig::default()
    };
    RunCoordinator::new(dispatcher, tracker, config)
}

fn fix_spec(affected: &str, issue: &str) -> TaskSpec {
    TaskSpec {
        title: format!("repair {}", affected),
        description: "apply the correction".to_string(),
        category: TaskCategory::Code,
        priority: TaskPriority::High,
        target_role: TargetRole::Fix,
        affected_files: vec![affected.to_string()],
        source_issue: issue.to_string(),
        source_type: "quality_gate".to_string(),
        max_retries: Some(0),
        timeout_secs: Some(10),
        ..TaskSpec::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_fix_writes_corrected_content_to_disk() {
    let dir = TempDir::new().unwrap();
    let project = project_with_file(&dir, "a.js", "console.log('broken');\n").await;

    let response = "Here is the corrected file:\n```js\nconsole.log('fixed');\n```\n";
    let coordinator = fix_coordinator(project.clone(), response);

    let result = coordinator
        .run(vec![fix_spec("a.js", "TypeError in a.js")], "quality_gate")
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.modified_files, vec!["a.js"]);

    let on_disk = std::fs::read_to_string(dir.path().join("a.js")).unwrap();
    assert_eq!(on_disk, "console.log('fixed');\n");
    // Snapshot tracks the write.
    assert_eq!(
        project.get_file("a.js").await.unwrap(),
        "console.log('fixed');\n"
    );
}

/// A raw (unfenced) response is accepted verbatim as the corrected file.
#[tokio::test]
async fn test_fix_accepts_raw_response() {
    let dir = TempDir::new().unwrap();
    let project = project_with_file(&dir, "util.js", "old\n").await;

    let coordinator = fix_coordinator(project, "module.exports = {};\n");
    let result = coordinator
        .run(vec![fix_spec("util.js", "stale export")], "quality_gate")
        .await
        .unwrap();

    assert!(result.success);
    let on_disk = std::fs::read_to_string(dir.path().join("util.js")).unwrap();
    assert_eq!(on_disk, "module.exports = {};\n");
}

/// An empty response violates the contract: the task fails terminally
/// (no retries) and the file is left untouched.
#[tokio::test]
async fn test_unparsable_response_fails_without_writing() {
    let dir = TempDir::new().unwrap();
    let original = "console.log('broken');\n";
    let project = project_with_file(&dir, "a.js", original).await;

    let coordinator = fix_coordinator(project, "   \n");
    let mut task = fix_spec("a.js", "TypeError in a.js");
    task.max_retries = Some(2);

    let result = coordinator.run(vec![task], "quality_gate").await.unwrap();

    assert!(!result.success);
    assert!(result.modified_files.is_empty());
    assert!(result.batch_results[0].errors[0].contains("no corrected content"));

    let on_disk = std::fs::read_to_string(dir.path().join("a.js")).unwrap();
    assert_eq!(on_disk, original);

    // Contract violations are not retried even with budget left.
    let tracker = coordinator.tracker().lock().await;
    let stored = tracker.get("TASK-001").unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.retry_count, 0);
}

/// A fix task naming a file outside the snapshot fails resolution.
#[tokio::test]
async fn test_unknown_target_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let project = project_with_file(&dir, "a.js", "content\n").await;

    let coordinator = fix_coordinator(project, "```js\nanything\n```");
    let result = coordinator
        .run(
            vec![fix_spec("missing.js", "error in missing.js")],
            "quality_gate",
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert!(!dir.path().join("missing.js").exists());
}
