//! taskmender
//!
//! A dependency-aware batch scheduler with a resilient execution core.
//! Callers derive remediation tasks (how is their business), register them
//! with the tracker, and the coordinator plans dependency-ordered batches,
//! executes them in a bounded worker pool with per-task deadlines and
//! in-batch retries, and aggregates an overall verdict plus the set of
//! modified files.
//!
//! Capability providers, the workers that actually perform a task, are
//! pluggable through [`services::dispatch::CapabilityProvider`]. Tasks
//! routed to the `fix` role follow a stricter single-file
//! write-and-verify contract.

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::batch::{BatchResult, BatchStatus, TaskBatch};
pub use models::task::{Task, TargetRole, TaskCategory, TaskPriority, TaskSpec, TaskStatus};
pub use services::batch_builder::{BatchBuilder, BatchPlan};
pub use services::batch_executor::BatchExecutor;
pub use services::coordinator::{RunCoordinator, RunResult};
pub use services::dispatch::resolver::{CapabilityResolver, ProviderFactory};
pub use services::dispatch::snapshot::ProjectContext;
pub use services::dispatch::{CapabilityProvider, Dispatcher, TaskOutcome};
pub use services::sync::ExternalTrackerSync;
pub use services::tracker::{RetryDecision, TaskTracker, TraceabilityReport};
pub use storage::task_log::{TaskLog, TaskLogStore};
pub use utils::config::SchedulerConfig;
pub use utils::error::{SchedulerError, SchedulerResult};
