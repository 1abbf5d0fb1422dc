//! Scheduler Configuration
//!
//! Tunables for the batch executor and run coordinator. Serializable so a
//! host application can embed it in its own configuration file.

use serde::{Deserialize, Serialize};

/// Configuration for batch scheduling and execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of tasks executing concurrently within a batch
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Interval at which the executor polls outstanding work, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Default retry budget for newly registered tasks
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Default per-task deadline for newly registered tasks, in seconds
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Abort remaining batches when a CRITICAL task terminally fails
    #[serde(default = "default_abort_on_critical")]
    pub abort_on_critical: bool,
    /// Mark dependents of terminally failed tasks BLOCKED instead of
    /// executing them. The permissive default matches plan-time readiness:
    /// a failed dependency does not stop its dependents from running.
    #[serde(default)]
    pub block_failed_dependents: bool,
    /// How many derivation sessions the task log retains
    #[serde(default = "default_session_history_limit")]
    pub session_history_limit: usize,
}

fn default_max_parallel() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_retries() -> u32 {
    2
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_abort_on_critical() -> bool {
    true
}

fn default_session_history_limit() -> usize {
    20
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            poll_interval_ms: default_poll_interval_ms(),
            default_max_retries: default_max_retries(),
            default_timeout_secs: default_timeout_secs(),
            abort_on_critical: default_abort_on_critical(),
            block_failed_dependents: false,
            session_history_limit: default_session_history_limit(),
        }
    }
}
