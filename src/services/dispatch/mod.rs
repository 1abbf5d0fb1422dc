//! Capability Dispatch
//!
//! Routes a task to its capability provider and shapes the provider's
//! output into a task outcome: the strict single-file path for fix tasks,
//! best-effort modified-file extraction for everything else.

pub mod file_extraction;
pub mod fix_contract;
pub mod resolver;
pub mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::task::{Task, TargetRole};
use crate::services::dispatch::file_extraction::{extract_modified_files, ExtractionContext};
use crate::services::dispatch::resolver::CapabilityResolver;
use crate::services::dispatch::snapshot::ProjectContext;
use crate::utils::error::{SchedulerError, SchedulerResult};

/// External worker that performs a task's work given its description.
///
/// Implementations treat the call as an opaque, possibly long-blocking
/// operation. The cancellation token is cooperative: the scheduler records
/// a timeout on its own clock whether or not the callee stops promptly.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Provider name, for logs and diagnostics.
    fn name(&self) -> &str;

    /// Perform the task, returning a textual result.
    async fn execute(
        &self,
        task: &Task,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> SchedulerResult<String>;

    /// Best-effort abort of in-flight side effects (e.g. kill a spawned
    /// process). Default is a no-op.
    async fn abort(&self) {}
}

/// Outcome of dispatching one task.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Provider result summary
    pub summary: String,
    /// Files this task actually modified
    pub modified_files: Vec<String>,
}

/// Dispatches tasks to resolved capability providers.
pub struct Dispatcher {
    resolver: CapabilityResolver,
    project: Arc<ProjectContext>,
}

impl Dispatcher {
    pub fn new(resolver: CapabilityResolver, project: Arc<ProjectContext>) -> Self {
        Self { resolver, project }
    }

    /// Execute one task end to end: resolve the provider, run it, and shape
    /// the result. Timeout enforcement is the batch executor's job; the
    /// deadline is passed through so providers can bound themselves.
    pub async fn dispatch(
        &self,
        task: &Task,
        cancel: CancellationToken,
    ) -> SchedulerResult<TaskOutcome> {
        let provider = self.resolver.resolve(task.target_role).await?;
        debug!(task_id = %task.id, provider = %provider.name(), role = %task.target_role, "dispatching task");

        if task.target_role == TargetRole::Fix {
            self.dispatch_fix(task, provider, cancel).await
        } else {
            self.dispatch_general(task, provider, cancel).await
        }
    }

    /// Best-effort abort hook for a timed-out task. Only consults the
    /// resolution cache; never constructs a new provider.
    pub async fn abort_task(&self, task: &Task) {
        if let Some(provider) = self.resolver.cached(task.target_role).await {
            warn!(task_id = %task.id, provider = %provider.name(), "aborting in-flight work");
            provider.abort().await;
        }
    }

    async fn dispatch_general(
        &self,
        task: &Task,
        provider: Arc<dyn CapabilityProvider>,
        cancel: CancellationToken,
    ) -> SchedulerResult<TaskOutcome> {
        let timeout = Duration::from_secs(task.timeout_secs);
        let output = provider.execute(task, timeout, cancel).await?;

        let known = self.project.known_files().await;
        let ctx = ExtractionContext {
            known_files: &known,
            declared_files: &task.affected_files,
            primary_language: self.project.primary_language(),
        };
        let modified_files = extract_modified_files(&output, &ctx);

        Ok(TaskOutcome {
            summary: output,
            modified_files,
        })
    }

    async fn dispatch_fix(
        &self,
        task: &Task,
        provider: Arc<dyn CapabilityProvider>,
        cancel: CancellationToken,
    ) -> SchedulerResult<TaskOutcome> {
        let target = fix_contract::resolve_target_file(task, &self.project).await?;
        let current = self.project.get_file(&target).await.ok_or_else(|| {
            SchedulerError::fix_contract(format!("no snapshot content for '{}'", target))
        })?;

        // The provider sees the file's current content plus the error
        // context and must return corrected content.
        let mut fix_task = task.clone();
        fix_task.description = format!(
            "{}\n\nTarget file: {}\nCurrent content:\n{}\nError context:\n{}",
            task.description, target, current, task.source_issue
        );

        let timeout = Duration::from_secs(task.timeout_secs);
        let response = provider.execute(&fix_task, timeout, cancel).await?;

        let corrected = fix_contract::parse_corrected_content(&response).ok_or_else(|| {
            SchedulerError::fix_contract(format!(
                "provider response for '{}' contained no corrected content",
                target
            ))
        })?;

        let modified = fix_contract::apply_fix(task, &target, &corrected, &self.project).await?;

        Ok(TaskOutcome {
            summary: format!("fixed {}", modified),
            modified_files: vec![modified],
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
