//! Persistence for the task tracker.

pub mod task_log;
