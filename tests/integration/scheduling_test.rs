//! Scheduling Integration Tests
//!
//! The canonical three-task scenario plus retry and timeout behavior,
//! driven through the public coordinator API with stub providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use taskmender::{
    BatchBuilder, CapabilityProvider, CapabilityResolver, Dispatcher, ProjectContext,
    RunCoordinator, SchedulerConfig, SchedulerError, SchedulerResult, TargetRole, Task,
    TaskCategory, TaskPriority, TaskSpec, TaskStatus, TaskTracker,
};

// ============================================================================
// Helper Functions
// ============================================================================

/// Fails every task whose title contains "fail"; counts all calls.
struct StubProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl CapabilityProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn execute(
        &self,
        task: &Task,
        _timeout: Duration,
        _cancel: CancellationToken,
    ) -> SchedulerResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if task.title.contains("fail") {
            Err(SchedulerError::execution("stub provider refused"))
        } else {
            Ok(format!("handled {}", task.title))
        }
    }
}

fn coordinator_with(provider: Arc<dyn CapabilityProvider>) -> RunCoordinator {
    let resolver = CapabilityResolver::new().register(TargetRole::Coder, provider);
    let project = Arc::new(ProjectContext::new("/tmp/project", "javascript"));
    let dispatcher = Arc::new(Dispatcher::new(resolver, project));
    let tracker = Arc::new(Mutex::new(TaskTracker::in_memory()));
    let config = SchedulerConfig {
        max_parallel: 4,
        poll_interval_ms: 20,
        abort_on_critical: false,
        ..SchedulerConfig::default()
    };
    RunCoordinator::new(dispatcher, tracker, config)
}

fn spec(title: &str, priority: TaskPriority, deps: Vec<&str>) -> TaskSpec {
    TaskSpec {
        title: title.to_string(),
        description: format!("description of {}", title),
        category: TaskCategory::Code,
        priority,
        target_role: TargetRole::Coder,
        dependencies: deps.iter().map(|s| s.to_string()).collect(),
        source_type: "review".to_string(),
        max_retries: Some(2),
        timeout_secs: Some(30),
        ..TaskSpec::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

/// T1 (no deps), T2 (depends on T1), T3 (no deps, critical). The planner
/// yields batch 1 = {T3, T1} and batch 2 = {T2}.
#[test]
fn test_three_task_plan_shape() {
    let t1 = {
        let mut t = Task::new(
            "T1",
            "one",
            "",
            TaskCategory::Code,
            TaskPriority::Medium,
            TargetRole::Coder,
            2,
            120,
        );
        t.dependencies = vec![];
        t
    };
    let mut t2 = t1.clone();
    t2.id = "T2".to_string();
    t2.dependencies = vec!["T1".to_string()];
    let mut t3 = t1.clone();
    t3.id = "T3".to_string();
    t3.priority = TaskPriority::Critical;

    let plan = BatchBuilder::build(vec![t1, t2, t3]);
    assert_eq!(plan.batches.len(), 2);
    assert_eq!(plan.batches[0].task_ids(), vec!["T3", "T1"]);
    assert_eq!(plan.batches[1].task_ids(), vec!["T2"]);
    assert!(plan.forced_task_ids.is_empty());
}

/// T1 exhausts every retry; T2 is still scheduled in batch 2 (the
/// documented permissive relaxation) but the run is failed overall.
#[tokio::test]
async fn test_failed_dependency_relaxation_end_to_end() {
    let provider = Arc::new(StubProvider {
        calls: AtomicUsize::new(0),
    });
    let coordinator = coordinator_with(provider.clone());

    let result = coordinator
        .run(
            vec![
                spec("one will fail", TaskPriority::Medium, vec![]),
                spec("two", TaskPriority::Medium, vec!["TASK-001"]),
                spec("three", TaskPriority::Critical, vec![]),
            ],
            "review",
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.batch_results.len(), 2);

    let tracker = coordinator.tracker().lock().await;
    let t1 = tracker.get("TASK-001").unwrap();
    let t2 = tracker.get("TASK-002").unwrap();
    let t3 = tracker.get("TASK-003").unwrap();

    // T1 was attempted max_retries + 1 = 3 times and is terminally failed.
    assert_eq!(t1.status, TaskStatus::Failed);
    assert_eq!(t1.retry_count, 2);
    // T2 still ran despite its failed dependency.
    assert_eq!(t2.status, TaskStatus::Completed);
    assert_eq!(t3.status, TaskStatus::Completed);
    // 3 attempts for T1, 1 each for T2 and T3.
    assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
}

/// A task whose provider hangs is reported as a timeout failure promptly,
/// and the batch call still returns.
#[tokio::test]
async fn test_hanging_provider_times_out() {
    struct HangingProvider;

    #[async_trait]
    impl CapabilityProvider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn execute(
            &self,
            _task: &Task,
            _timeout: Duration,
            cancel: CancellationToken,
        ) -> SchedulerResult<String> {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(600)) => Ok("never".to_string()),
                _ = cancel.cancelled() => Err(SchedulerError::Cancelled),
            }
        }
    }

    let coordinator = coordinator_with(Arc::new(HangingProvider));
    let mut hung = spec("hangs forever", TaskPriority::Medium, vec![]);
    hung.max_retries = Some(0);
    hung.timeout_secs = Some(1);

    let started = std::time::Instant::now();
    let result = coordinator.run(vec![hung], "review").await.unwrap();

    assert!(!result.success);
    assert!(result.batch_results[0].errors[0].contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(5));

    let tracker = coordinator.tracker().lock().await;
    assert_eq!(tracker.get("TASK-001").unwrap().status, TaskStatus::Failed);
}

/// Traceability counts stay consistent after a mixed run.
#[tokio::test]
async fn test_traceability_after_run() {
    let provider = Arc::new(StubProvider {
        calls: AtomicUsize::new(0),
    });
    let coordinator = coordinator_with(provider);

    coordinator
        .run(
            vec![
                spec("good one", TaskPriority::Medium, vec![]),
                spec("bad one will fail", TaskPriority::Low, vec![]),
            ],
            "review",
        )
        .await
        .unwrap();

    let tracker = coordinator.tracker().lock().await;
    let report = tracker.traceability_report();
    assert_eq!(report.total_tasks, 2);
    assert_eq!(
        report.pending
            + report.in_progress
            + report.completed
            + report.failed
            + report.blocked
            + report.skipped,
        report.total_tasks
    );
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.counts_by_source["review"], 2);
}
