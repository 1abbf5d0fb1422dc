//! Data models for tasks and batches.

pub mod batch;
pub mod task;
