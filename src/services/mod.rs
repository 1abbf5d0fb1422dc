//! Scheduling services: planning, execution, dispatch, tracking.

pub mod batch_builder;
pub mod batch_executor;
pub mod coordinator;
pub mod dispatch;
pub mod sync;
pub mod tracker;
