//! Fix-Task Contract
//!
//! Tasks routed to the `fix` role follow a stricter single-file contract
//! than general tasks: exactly one target file is resolved, the provider
//! returns corrected content for it, and the write is verified by reading
//! the file back before the shared snapshot is updated. Any failure along
//! the way is a hard, specific error; "fix succeeded but nothing changed
//! on disk" cannot happen silently.

use std::sync::OnceLock;

use regex::Regex;
use tokio::fs;
use tracing::info;

use crate::models::task::Task;
use crate::services::dispatch::snapshot::ProjectContext;
use crate::utils::error::{SchedulerError, SchedulerResult};

fn path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9_][A-Za-z0-9_./-]*\.[A-Za-z0-9]{1,5}").expect("valid regex")
    })
}

/// Resolve the single target file for a fix task.
///
/// First usable candidate wins: declared `affected_files` in order, then
/// paths parsed out of the issue text. A candidate is usable when it is a
/// known project file. No candidate is a contract violation.
pub async fn resolve_target_file(task: &Task, project: &ProjectContext) -> SchedulerResult<String> {
    for path in &task.affected_files {
        if project.contains_file(path).await {
            return Ok(path.clone());
        }
    }

    for m in path_pattern().find_iter(&task.source_issue) {
        let candidate = m.as_str();
        if project.contains_file(candidate).await {
            return Ok(candidate.to_string());
        }
    }

    Err(SchedulerError::fix_contract(format!(
        "no resolvable target file for task '{}' (affected_files: {:?})",
        task.id, task.affected_files
    )))
}

/// Parse corrected file content out of a provider response.
///
/// The first fenced code block wins; a fence-free, non-empty response is
/// taken verbatim. Returns None when no content can be recovered.
pub fn parse_corrected_content(response: &str) -> Option<String> {
    if let Some(open) = response.find("```") {
        let after_fence = &response[open + 3..];
        // Skip the info string ("```js") up to the first newline.
        let body_start = after_fence.find('\n')? + 1;
        let body = &after_fence[body_start..];
        let close = body.find("```")?;
        let content = &body[..close];
        if content.trim().is_empty() {
            return None;
        }
        return Some(content.to_string());
    }

    let trimmed = response.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(response.to_string())
    }
}

/// Write corrected content to the target file, verify the write by reading
/// it back, and synchronize the shared snapshot. Returns the relative path
/// that was modified.
pub async fn apply_fix(
    task: &Task,
    target: &str,
    corrected: &str,
    project: &ProjectContext,
) -> SchedulerResult<String> {
    let absolute = project.resolve_path(target)?;

    if let Some(parent) = absolute.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&absolute, corrected).await.map_err(|e| {
        SchedulerError::fix_contract(format!("failed to write '{}': {}", target, e))
    })?;

    // Read-after-write equality check. The snapshot is only updated once
    // the on-disk content provably matches.
    let on_disk = fs::read_to_string(&absolute).await.map_err(|e| {
        SchedulerError::fix_contract(format!("failed to re-read '{}': {}", target, e))
    })?;
    if on_disk != corrected {
        return Err(SchedulerError::fix_contract(format!(
            "read-after-write mismatch for '{}'",
            target
        )));
    }

    project.insert_file(target, corrected).await;
    info!(task_id = %task.id, file = %target, "fix applied and verified");
    Ok(target.to_string())
}

// ============================================================================
// Tests
// ============================================================================
