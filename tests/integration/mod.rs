//! Integration Tests Module
//!
//! End-to-end tests for the scheduling engine: dependency-ordered runs,
//! in-batch retries with deadlines, the fix-task contract against a real
//! temporary project, and task-log persistence across restarts.

// End-to-end scheduling scenarios (planning, retries, escalation)
mod scheduling_test;

// Fix-task contract against a temporary on-disk project
mod fix_contract_test;

// Task log persistence and reporting
mod persistence_test;
