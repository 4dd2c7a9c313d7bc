//! Coding standards loaded from a directory of text documents

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// One standards document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standard {
    /// File name, used as a heading in the report
    pub name: String,
    pub text: String,
}

/// Read every file directly inside `dir` whose extension is `extension`.
///
/// Subdirectories are not searched. Results are ordered by file name so the
/// report is stable between runs.
pub fn load_standards(dir: &Path, extension: &str) -> Result<Vec<Standard>> {
    if !dir.is_dir() {
        anyhow::bail!("Standards directory '{}' does not exist", dir.display());
    }

    let mut standards = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry
            .with_context(|| format!("Failed to list standards in '{}'", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read standard '{}'", path.display()))?;
        standards.push(Standard {
            name: entry.file_name().to_string_lossy().into_owned(),
            text,
        });
    }

    if standards.is_empty() {
        tracing::warn!(
            "no .{} files found in standards directory '{}'",
            extension,
            dir.display()
        );
    }
    Ok(standards)
}
