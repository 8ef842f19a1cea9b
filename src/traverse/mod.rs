//! Traversal module
//!
//! Two ways of enumerating what gets archived:
//! - a lazy, depth-first file-system walk with exclusion rules and a
//!   performance guard, plus a sorted structure tree of the same directory
//! - resource discovery in fetched pages, producing per-kind fetch lists

mod filesystem;
mod performance;
mod rules;
mod tree;
mod web;

pub use filesystem::{describe, FileDescriptor, FsTraverser, WalkOptions};
pub use performance::{PerformanceGuard, PerformanceLimit};
pub use rules::ScanRules;
pub use tree::{structure_tree, DirectoryNode, FileNode, TreeNode};
pub use web::{ResourceTasks, WebTraverser};
