//! Shared Code Snapshot
//!
//! The caller-visible view of the project: root directory, declared primary
//! language, and a path -> content map of known files. The fix contract
//! writes to disk first and only then synchronizes content here, so the
//! snapshot never claims a change that did not land on disk.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use tokio::sync::RwLock;

use crate::utils::error::{SchedulerError, SchedulerResult};

/// Shared project state consulted and updated by the dispatcher.
pub struct ProjectContext {
    root: PathBuf,
    /// Declared primary language, lowercase (e.g. "javascript", "python")
    primary_language: String,
    files: RwLock<HashMap<String, String>>,
}

impl ProjectContext {
    pub fn new(root: impl Into<PathBuf>, primary_language: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            primary_language: primary_language.into().to_lowercase(),
            files: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn primary_language(&self) -> &str {
        &self.primary_language
    }

    /// Seed the snapshot with known file contents.
    pub async fn insert_file(&self, path: impl Into<String>, content: impl Into<String>) {
        self.files.write().await.insert(path.into(), content.into());
    }

    pub async fn get_file(&self, path: &str) -> Option<String> {
        self.files.read().await.get(path).cloned()
    }

    pub async fn contains_file(&self, path: &str) -> bool {
        self.files.read().await.contains_key(path)
    }

    pub async fn known_files(&self) -> HashSet<String> {
        self.files.read().await.keys().cloned().collect()
    }

    /// Resolve a relative path against the project root, rejecting absolute
    /// paths and any traversal outside the root.
    pub fn resolve_path(&self, relative: &str) -> SchedulerResult<PathBuf> {
        let rel = Path::new(relative);
        if rel.is_absolute() {
            return Err(SchedulerError::fix_contract(format!(
                "absolute path not allowed: '{}'",
                relative
            )));
        }
        for component in rel.components() {
            if matches!(component, Component::ParentDir) {
                return Err(SchedulerError::fix_contract(format!(
                    "path escapes project root: '{}'",
                    relative
                )));
            }
        }
        Ok(self.root.join(rel))
    }
}
