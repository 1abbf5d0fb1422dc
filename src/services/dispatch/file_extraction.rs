//! Modified-File Extraction
//!
//! Best-effort parsing of file paths out of a capability provider's
//! free-text output, for tasks that do not go through the strict fix
//! contract. Lossy by design: candidates are pattern-matched, filtered by
//! a junk blacklist and by the project's primary language, and validated
//! against files that are known to exist or were declared as affected.
//! This is a boundary adapter, not part of the scheduler's correctness
//! guarantees.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Tokens that match the path pattern but never name a real file.
const JUNK_TOKENS: &[&str] = &[
    "e.g",
    "e.g.",
    "i.e",
    "i.e.",
    "etc.",
    "vs.",
    "node_modules",
    "__pycache__",
    ".git",
    "a.k.a",
];

fn path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9_][A-Za-z0-9_./-]*\.[A-Za-z0-9]{1,5}").expect("valid regex")
    })
}

/// File extensions accepted for a given primary language, besides the
/// language-neutral set.
fn language_extensions(language: &str) -> &'static [&'static str] {
    match language {
        "javascript" => &["js", "jsx", "mjs", "cjs"],
        "typescript" => &["ts", "tsx", "mts", "cts"],
        "python" => &["py", "pyi"],
        "rust" => &["rs"],
        "go" => &["go"],
        "java" => &["java"],
        "ruby" => &["rb"],
        "c" => &["c", "h"],
        "cpp" => &["cpp", "cc", "hpp", "hh"],
        _ => &[],
    }
}

/// Extensions accepted regardless of primary language.
const NEUTRAL_EXTENSIONS: &[&str] = &[
    "json", "md", "toml", "yml", "yaml", "txt", "cfg", "ini", "env", "html", "css",
];

/// Inputs to extraction: what exists, what was declared, what language the
/// project speaks.
pub struct ExtractionContext<'a> {
    pub known_files: &'a HashSet<String>,
    pub declared_files: &'a [String],
    pub primary_language: &'a str,
}

/// Extract modified file paths from provider output.
///
/// Candidates that fail every filter leave the result empty, in which case
/// the caller falls back to the task's declared `affected_files`.
pub fn extract_modified_files(output: &str, ctx: &ExtractionContext<'_>) -> Vec<String> {
    let allowed_lang = language_extensions(ctx.primary_language);
    let mut found: Vec<String> = Vec::new();

    for m in path_pattern().find_iter(output) {
        let candidate = m.as_str().trim_matches('.');
        if candidate.is_empty() || is_junk(candidate) {
            continue;
        }

        let Some(ext) = candidate.rsplit('.').next() else {
            continue;
        };
        let ext = ext.to_lowercase();
        if !allowed_lang.contains(&ext.as_str()) && !NEUTRAL_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        // Only keep paths we can corroborate: known on disk or explicitly
        // declared by the task.
        let corroborated = ctx.known_files.contains(candidate)
            || ctx.declared_files.iter().any(|f| f == candidate);
        if !corroborated {
            continue;
        }

        if !found.iter().any(|f| f == candidate) {
            found.push(candidate.to_string());
        }
    }

    if found.is_empty() {
        // Unresolved extraction falls back to the declared files.
        return ctx.declared_files.to_vec();
    }
    found
}

fn is_junk(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    if JUNK_TOKENS.iter().any(|junk| lower == *junk || lower.starts_with(&format!("{}/", junk))) {
        return true;
    }
    // Bare version numbers ("1.0", "2.10.3") match the path pattern too.
    lower
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == 'v')
}

// ============================================================================
// Tests
// ============================================================================
