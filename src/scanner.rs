//! Source discovery.
//!
//! Resolves `./...`-style patterns into the directories holding Go
//! packages. The walk skips entries whose names start with `.` or `_`, as
//! well as `vendor` and `testdata` trees, the same directories the go tool
//! ignores.

use crate::package::is_source_file;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories below `root` matching any of `patterns` that contain at least
/// one non-test `.go` file, sorted.
///
/// Patterns are relative to `root`. A trailing `/...` matches the directory
/// itself and everything below it, `...` elsewhere matches any string.
pub fn resolve_paths(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let matchers = patterns
        .iter()
        .map(|pattern| pattern_regex(pattern))
        .collect::<Result<Vec<_>>>()?;

    let mut dirs = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped(e))
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let relative = relative_slash_path(root, entry.path());
        if matchers.iter().any(|re| re.is_match(&relative)) && has_sources(entry.path())? {
            dirs.push(entry.into_path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn pattern_regex(pattern: &str) -> Result<Regex> {
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    let pattern = pattern.trim_end_matches('/');
    let pattern = if pattern == "." { "" } else { pattern };

    let (body, any_below) = match pattern.strip_suffix("/...") {
        Some(prefix) => (prefix, true),
        None if pattern == "..." => ("", true),
        None => (pattern, false),
    };
    let body = body
        .split("...")
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    let source = match (any_below, body.is_empty()) {
        (true, true) => "^.*$".to_string(),
        (true, false) => format!("^{body}(/.*)?$"),
        (false, _) => format!("^{body}$"),
    };
    Regex::new(&source).with_context(|| format!("Invalid pattern {pattern:?}"))
}

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|s| {
                s.starts_with('.') || s.starts_with('_') || s == "vendor" || s == "testdata"
            })
}

/// `dir` relative to `root` with `/` separators; empty for the root itself.
pub fn relative_slash_path(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn has_sources(dir: &Path) -> Result<bool> {
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && is_source_file(&path) {
            return Ok(true);
        }
    }
    Ok(false)
}
