//! Directory structure snapshot

use super::filesystem::entry_metadata;
use super::performance::PerformanceGuard;
use super::rules::ScanRules;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A node of the structure tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Directory(DirectoryNode),
    File(FileNode),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,

    /// Set when the directory lies beyond the depth limit
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

impl DirectoryNode {
    fn named(path: &Path) -> Self {
        Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            ..Self::default()
        }
    }

    fn with_error(path: &Path, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::named(path)
        }
    }

    /// Number of files anywhere below this directory
    pub fn file_count(&self) -> u64 {
        self.children
            .iter()
            .map(|child| match child {
                TreeNode::File(_) => 1,
                TreeNode::Directory(dir) => dir.file_count(),
            })
            .sum()
    }
}

/// Builds the sorted structure tree of `root`
///
/// Directories deeper than `max_depth` appear with `truncated` set and no
/// children. Read failures and performance aborts are recorded in the
/// affected node's `error` rather than failing the whole tree.
pub fn structure_tree(
    root: &Path,
    max_depth: Option<usize>,
    rules: &ScanRules,
    guard: &mut PerformanceGuard,
) -> DirectoryNode {
    if !root.exists() {
        tracing::error!("Directory does not exist: {}", root.display());
        return DirectoryNode::with_error(root, "Directory not found");
    }
    if !root.is_dir() {
        tracing::error!("Path is not a directory: {}", root.display());
        return DirectoryNode::with_error(root, "Path is not a directory");
    }

    build(root, 0, max_depth, rules, guard)
}

fn build(
    path: &Path,
    depth: usize,
    max_depth: Option<usize>,
    rules: &ScanRules,
    guard: &mut PerformanceGuard,
) -> DirectoryNode {
    if max_depth.is_some_and(|max| depth > max) {
        return DirectoryNode {
            truncated: true,
            ..DirectoryNode::named(path)
        };
    }

    if let Err(limit) = guard.check() {
        tracing::warn!("Structure scan limited at {}: {:?}", path.display(), limit);
        return DirectoryNode::with_error(path, "Performance limit reached");
    }

    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Cannot read directory {}: {}", path.display(), e);
            return DirectoryNode::with_error(path, e.to_string());
        }
    };

    let mut paths: Vec<_> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();

    let mut node = DirectoryNode::named(path);
    for child in paths {
        let Some(metadata) = entry_metadata(&child) else {
            continue;
        };

        if metadata.is_dir() {
            if !rules.skip_directory(&child) {
                node.children.push(TreeNode::Directory(build(
                    &child,
                    depth + 1,
                    max_depth,
                    rules,
                    guard,
                )));
            }
        } else if metadata.is_file() && !rules.skip_file(&child) {
            guard.record_file();
            node.children.push(TreeNode::File(FileNode {
                name: child
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size: metadata.len(),
                modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            }));
        }
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::limiter::{FixedProbe, ManualClock};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ScanRules, PerformanceGuard) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("z.txt"), "z").unwrap();
        fs::write(root.join("a.txt"), "aaa").unwrap();
        fs::create_dir_all(root.join("lib/inner")).unwrap();
        fs::write(root.join("lib/mod.rs"), "mod x;").unwrap();
        fs::write(root.join("lib/inner/deep.rs"), "").unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();

        let mut config = Config::default();
        config.security.restricted_paths.clear();
        let rules = ScanRules::from_config(&config, None).unwrap();
        let guard = PerformanceGuard::new(
            &config.scan,
            Arc::new(FixedProbe::default()),
            Arc::new(ManualClock::new()),
        );
        (dir, rules, guard)
    }

    fn child_names(node: &DirectoryNode) -> Vec<&str> {
        node.children
            .iter()
            .map(|c| match c {
                TreeNode::Directory(d) => d.name.as_str(),
                TreeNode::File(f) => f.name.as_str(),
            })
            .collect()
    }

    #[test]
    fn test_sorted_tree_with_exclusions() {
        let (dir, rules, mut guard) = setup();
        let tree = structure_tree(dir.path(), None, &rules, &mut guard);

        assert_eq!(child_names(&tree), vec!["a.txt", "lib", "z.txt"]);
        assert_eq!(tree.file_count(), 4);

        match &tree.children[1] {
            TreeNode::Directory(lib) => assert_eq!(child_names(lib), vec!["inner", "mod.rs"]),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_truncated_beyond_depth() {
        let (dir, rules, mut guard) = setup();
        let tree = structure_tree(dir.path(), Some(0), &rules, &mut guard);

        assert_eq!(tree.file_count(), 2);
        match &tree.children[1] {
            TreeNode::Directory(lib) => {
                assert!(lib.truncated);
                assert!(lib.children.is_empty());
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_missing_root() {
        let (_dir, rules, mut guard) = setup();
        let tree = structure_tree(Path::new("/no/such/dir"), None, &rules, &mut guard);
        assert_eq!(tree.error.as_deref(), Some("Directory not found"));
    }

    #[test]
    fn test_file_root() {
        let (dir, rules, mut guard) = setup();
        let tree = structure_tree(&dir.path().join("a.txt"), None, &rules, &mut guard);
        assert_eq!(tree.error.as_deref(), Some("Path is not a directory"));
    }

    #[test]
    fn test_serialized_shape() {
        let (dir, rules, mut guard) = setup();
        let tree = structure_tree(dir.path(), Some(0), &rules, &mut guard);
        let value = serde_yaml::to_value(TreeNode::Directory(tree)).unwrap();
        assert_eq!(value["type"], "directory");
        assert_eq!(value["children"][0]["type"], "file");
        assert_eq!(value["children"][0]["size"], 3);
        assert_eq!(value["children"][1]["truncated"], true);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_symlink_cycle_not_followed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x.txt"), "x").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop2")).unwrap();

        let (_other, rules, mut guard) = setup();
        let tree = structure_tree(dir.path(), None, &rules, &mut guard);
        assert_eq!(tree.file_count(), 1);
        assert_eq!(child_names(&tree), vec!["x.txt"]);
    }
}
