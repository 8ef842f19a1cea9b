//! Output file naming helpers

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Longest file stem kept by [`sanitize_filename`], in characters
const MAX_STEM_CHARS: usize = 200;

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces characters that are invalid in file names with `_` and caps the
/// stem length, keeping the extension
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) || c.is_control() { '_' } else { c })
        .collect();

    let (stem, ext) = split_extension(&cleaned);
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
    let stem = if stem.is_empty() { "_".to_string() } else { stem };
    format!("{}{}", stem, ext)
}

/// Returns `path` itself if free, else the first of `stem_1.ext`, `stem_2.ext`,
/// ... that does not exist
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&name);

    (1u64..)
        .map(|n| parent.join(format!("{}_{}{}", stem, n, ext)))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Backup location for `path`: `{stem}_backup_{YYYYmmdd_HHMMSS}{ext}`
pub fn backup_path(path: &Path, at: DateTime<Local>) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&name);
    path.with_file_name(format!(
        "{}_backup_{}{}",
        stem,
        at.format("%Y%m%d_%H%M%S"),
        ext
    ))
}

/// Backups of `path` present on disk, oldest first
pub fn existing_backups(path: &Path) -> Vec<PathBuf> {
    let Some(parent) = path.parent() else {
        return Vec::new();
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&name);
    let prefix = format!("{}_backup_", stem);

    let Ok(entries) = std::fs::read_dir(if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    }) else {
        return Vec::new();
    };

    let mut backups: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy())
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(ext))
        })
        .collect();
    // Timestamps are zero-padded, so name order is age order
    backups.sort();
    backups
}

/// `{prefix}_{YYYYmmdd_HHMMSS}`
pub fn timestamped_name(prefix: &str, at: DateTime<Local>) -> String {
    format!("{}_{}", prefix, at.format("%Y%m%d_%H%M%S"))
}

/// Splits `name` into stem and extension (with its dot); dotfiles have no
/// extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}
