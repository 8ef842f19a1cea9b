//! Lazy recursive file-system walker

use super::performance::{PerformanceGuard, PerformanceLimit};
use super::rules::ScanRules;
use crate::config::Config;
use crate::content::classify::PLAIN_TEXT;
use crate::limiter::{Clock, ProcessProbe, ResourceProbe, SystemClock};
use crate::output::SkipReason;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::fs::{self, File, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Descriptors buffered between the blocking walker and async consumers
const STREAM_BUFFER: usize = 256;

/// Facts about one file found by the walker
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub mime_type: String,

    /// Lowercase, with the leading dot; empty when there is none
    pub extension: String,

    /// Octal permission bits, e.g. `644`
    pub permissions: String,

    pub skip_reason: Option<SkipReason>,
}

/// Per-walk options
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Deepest directory level descended into; files directly under the
    /// root are at depth 0
    pub max_depth: Option<usize>,

    /// Files larger than this are yielded with `size_limit_exceeded`
    pub max_file_size: u64,
}

impl WalkOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_depth: config.limits.max_depth,
            max_file_size: config.limits.max_file_size,
        }
    }
}

/// Depth-first walk of a directory tree, yielding [`FileDescriptor`]s
///
/// Entries within a directory are visited in name order. The walk stops for
/// good when the performance guard trips; everything yielded up to that
/// point stays valid.
pub struct FsTraverser {
    rules: ScanRules,
    options: WalkOptions,
    guard: PerformanceGuard,
    stack: Vec<(PathBuf, usize)>,
    pending: VecDeque<FileDescriptor>,
    yielded: HashSet<PathBuf>,
    stopped: Option<PerformanceLimit>,
}

impl FsTraverser {
    pub fn new(root: impl Into<PathBuf>, rules: ScanRules, options: WalkOptions, config: &Config) -> Self {
        Self::with_parts(
            root,
            rules,
            options,
            config,
            Arc::new(ProcessProbe::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        root: impl Into<PathBuf>,
        rules: ScanRules,
        options: WalkOptions,
        config: &Config,
        probe: Arc<dyn ResourceProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rules,
            options,
            guard: PerformanceGuard::new(&config.scan, probe, clock),
            stack: vec![(root.into(), 0)],
            pending: VecDeque::new(),
            yielded: HashSet::new(),
            stopped: None,
        }
    }

    /// Limit that stopped the walk early, if any
    pub fn stopped_by(&self) -> Option<PerformanceLimit> {
        self.stopped
    }

    /// Forgets which files were yielded and restarts the throughput clock
    pub fn clear_cache(&mut self) {
        self.yielded.clear();
        self.guard.reset();
    }

    /// Runs the walk on the blocking pool and streams descriptors back
    ///
    /// Must be called from within a Tokio runtime.
    pub fn into_stream(self) -> ReceiverStream<FileDescriptor> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::task::spawn_blocking(move || {
            for descriptor in self {
                if tx.blocking_send(descriptor).is_err() {
                    break;
                }
            }
        });
        ReceiverStream::new(rx)
    }

    fn visit_directory(&mut self, dir: &Path, depth: usize) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot read directory {}: {}", dir.display(), e);
                return;
            }
        };

        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        paths.sort();

        let mut subdirs = Vec::new();
        for path in paths {
            let Some(metadata) = entry_metadata(&path) else {
                continue;
            };

            if metadata.is_dir() {
                let within_depth = self.options.max_depth.map_or(true, |max| depth < max);
                if within_depth && !self.rules.skip_directory(&path) {
                    subdirs.push(path);
                }
            } else if metadata.is_file() && !self.rules.skip_file(&path) {
                let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
                if self.yielded.insert(key) {
                    self.guard.record_file();
                    self.pending.push_back(describe(&path, &metadata, self.options.max_file_size));
                }
            }
        }

        // Reversed so the stack pops subdirectories in name order
        for subdir in subdirs.into_iter().rev() {
            self.stack.push((subdir, depth + 1));
        }
    }
}

impl Iterator for FsTraverser {
    type Item = FileDescriptor;

    fn next(&mut self) -> Option<FileDescriptor> {
        loop {
            if let Some(descriptor) = self.pending.pop_front() {
                return Some(descriptor);
            }
            if self.stopped.is_some() {
                return None;
            }

            let (dir, depth) = self.stack.pop()?;

            if let Err(limit) = self.guard.check() {
                tracing::error!("Scan stopped early: {:?}", limit);
                self.stopped = Some(limit);
                self.stack.clear();
                return None;
            }

            self.visit_directory(&dir, depth);
        }
    }
}

/// Metadata for a directory entry, or `None` when it should not be visited
///
/// Symlinks to files resolve to their target. Symlinks to directories are
/// never descended into, so link cycles cannot repeat a subtree.
pub(super) fn entry_metadata(path: &Path) -> Option<Metadata> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::debug!("Cannot stat {}: {}", path.display(), e);
            return None;
        }
    };
    if !metadata.file_type().is_symlink() {
        return Some(metadata);
    }

    match fs::metadata(path) {
        Ok(target) if target.is_dir() => {
            tracing::debug!("Not following directory symlink {}", path.display());
            None
        }
        Ok(target) => Some(target),
        Err(e) => {
            tracing::debug!("Dangling symlink {}: {}", path.display(), e);
            None
        }
    }
}

/// Builds the descriptor for one regular file
pub fn describe(path: &Path, metadata: &Metadata, max_file_size: u64) -> FileDescriptor {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let mut descriptor = FileDescriptor {
        path: path.to_path_buf(),
        name,
        size: metadata.len(),
        created_at: metadata.created().ok().map(DateTime::<Utc>::from),
        modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        mime_type: PLAIN_TEXT.to_string(),
        extension,
        permissions: permission_bits(metadata),
        skip_reason: None,
    };

    if descriptor.size > max_file_size {
        tracing::warn!(
            "File exceeds size limit ({} > {}): {}",
            descriptor.size,
            max_file_size,
            path.display()
        );
        descriptor.skip_reason = Some(SkipReason::SizeLimitExceeded);
        return descriptor;
    }

    if let Err(e) = File::open(path) {
        tracing::warn!("Access denied: {} ({})", path.display(), e);
        descriptor.skip_reason = Some(SkipReason::AccessDenied);
        return descriptor;
    }

    if let Ok(Some(kind)) = infer::get_from_path(path) {
        descriptor.mime_type = kind.mime_type().to_string();
    }

    descriptor
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:03o}", metadata.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> String {
    if metadata.permissions().readonly() {
        "444".to_string()
    } else {
        "666".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::{FixedProbe, ManualClock};
    use std::time::Duration;
    use tempfile::TempDir;

    // Temp dirs may live under a default restricted prefix (macOS /var)
    fn test_config() -> Config {
        let mut config = Config::default();
        config.security.restricted_paths.clear();
        config
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), "alpha").unwrap();
        fs::write(root.join("b.md"), "# beta").unwrap();
        fs::write(root.join(".hidden"), "secret").unwrap();
        fs::write(root.join("cache.pyc"), "bytecode").unwrap();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("sub/c.txt"), "gamma").unwrap();
        fs::write(root.join("sub/deeper/d.txt"), "delta").unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "[core]").unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        dir
    }

    fn walker(root: &Path, config: &Config, pattern: Option<&str>) -> FsTraverser {
        let rules = ScanRules::from_config(config, pattern).unwrap();
        FsTraverser::with_parts(
            root,
            rules,
            WalkOptions::from_config(config),
            config,
            Arc::new(FixedProbe::default()),
            Arc::new(ManualClock::new()),
        )
    }

    fn names(walker: FsTraverser) -> Vec<String> {
        walker.map(|d| d.name).collect()
    }

    #[test]
    fn test_walk_order_and_exclusions() {
        let dir = fixture();
        let config = test_config();
        assert_eq!(
            names(walker(dir.path(), &config, None)),
            vec!["a.txt", "b.md", "c.txt", "d.txt"]
        );
    }

    #[test]
    fn test_max_depth_zero_yields_root_files_only() {
        let dir = fixture();
        let mut config = test_config();
        config.limits.max_depth = Some(0);
        assert_eq!(names(walker(dir.path(), &config, None)), vec!["a.txt", "b.md"]);
    }

    #[test]
    fn test_max_depth_one() {
        let dir = fixture();
        let mut config = test_config();
        config.limits.max_depth = Some(1);
        assert_eq!(
            names(walker(dir.path(), &config, None)),
            vec!["a.txt", "b.md", "c.txt"]
        );
    }

    #[test]
    fn test_git_directory_never_descended() {
        let dir = fixture();
        let mut config = test_config();
        config.scan.include_hidden = true;
        let found: Vec<PathBuf> = walker(dir.path(), &config, None).map(|d| d.path).collect();
        assert!(found.iter().all(|p| !p.components().any(|c| c.as_os_str() == ".git")));
        assert!(found.iter().any(|p| p.ends_with(".hidden")));
    }

    #[test]
    fn test_name_pattern() {
        let dir = fixture();
        let config = test_config();
        assert_eq!(
            names(walker(dir.path(), &config, Some("*.txt"))),
            vec!["a.txt", "c.txt", "d.txt"]
        );
    }

    #[test]
    fn test_descriptor_fields() {
        let dir = fixture();
        let config = test_config();
        let first = walker(dir.path(), &config, None).next().unwrap();
        assert_eq!(first.name, "a.txt");
        assert_eq!(first.size, 5);
        assert_eq!(first.extension, ".txt");
        assert_eq!(first.mime_type, PLAIN_TEXT);
        assert!(first.modified_at.is_some());
        assert_eq!(first.permissions.len(), 3);
        assert!(first.skip_reason.is_none());
    }

    #[test]
    fn test_sniffed_mime_type() {
        let dir = TempDir::new().unwrap();
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        fs::write(dir.path().join("image.dat"), png).unwrap();
        let found: Vec<FileDescriptor> = walker(dir.path(), &test_config(), None).collect();
        assert_eq!(found[0].mime_type, "image/png");
    }

    #[test]
    fn test_oversized_file_is_flagged() {
        let dir = fixture();
        let mut config = test_config();
        config.limits.max_file_size = 5;
        let found: Vec<FileDescriptor> = walker(dir.path(), &config, None).collect();
        let b = found.iter().find(|d| d.name == "b.md").unwrap();
        assert_eq!(b.skip_reason, Some(SkipReason::SizeLimitExceeded));
        let a = found.iter().find(|d| d.name == "a.txt").unwrap();
        assert!(a.skip_reason.is_none());
    }

    #[test]
    fn test_performance_limit_stops_walk() {
        let dir = fixture();
        let mut config = test_config();
        config.scan.max_memory_bytes = 10;
        let rules = ScanRules::from_config(&config, None).unwrap();
        let mut walker = FsTraverser::with_parts(
            dir.path(),
            rules,
            WalkOptions::from_config(&config),
            &config,
            Arc::new(FixedProbe::new(11, 0.0)),
            Arc::new(ManualClock::new()),
        );
        assert!(walker.next().is_none());
        assert!(matches!(walker.stopped_by(), Some(PerformanceLimit::Memory { .. })));
    }

    #[test]
    fn test_throughput_floor_keeps_partial_results() {
        let dir = fixture();
        let mut config = test_config();
        config.scan.rate_grace_seconds = 1;
        config.scan.min_files_per_second = 1.0;
        let clock = Arc::new(ManualClock::new());
        let rules = ScanRules::from_config(&config, None).unwrap();
        let mut walker = FsTraverser::with_parts(
            dir.path(),
            rules,
            WalkOptions::from_config(&config),
            &config,
            Arc::new(FixedProbe::default()),
            clock.clone(),
        );

        // Root directory is read before any time passes
        assert_eq!(walker.next().unwrap().name, "a.txt");
        assert_eq!(walker.next().unwrap().name, "b.md");
        clock.advance(Duration::from_secs(60));
        assert!(walker.next().is_none());
        assert!(matches!(walker.stopped_by(), Some(PerformanceLimit::Throughput { .. })));
    }

    #[test]
    fn test_walk_is_single_pass() {
        let dir = fixture();
        let config = test_config();
        let mut walker = walker(dir.path(), &config, None);
        assert_eq!(walker.by_ref().count(), 4);
        walker.clear_cache();
        assert!(walker.next().is_none());
    }

    #[tokio::test]
    async fn test_into_stream() {
        use tokio_stream::StreamExt;

        let dir = fixture();
        let config = test_config();
        let stream = walker(dir.path(), &config, None).into_stream();
        let found: Vec<FileDescriptor> = stream.collect().await;
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let config = test_config();
        let mut walker = walker(Path::new("/definitely/not/here"), &config, None);
        assert!(walker.next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_symlink_cycle_not_followed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/y.txt"), "y").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("sub"), dir.path().join("sub/up")).unwrap();

        let config = test_config();
        assert_eq!(names(walker(dir.path(), &config, None)), vec!["x.txt", "y.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_symlink_is_yielded() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/real.txt"), "real").unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("data/real.txt"),
            dir.path().join("alias.txt"),
        )
        .unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling"))
            .unwrap();

        let found: Vec<FileDescriptor> = walker(dir.path(), &test_config(), None).collect();
        // Both names point at one file, which is yielded once
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].size, 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_access_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked.txt");
        fs::write(&locked, "private").unwrap();
        fs::write(dir.path().join("open.txt"), "public").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through mode bits; nothing to observe then
        if File::open(&locked).is_ok() {
            return;
        }

        let found: Vec<FileDescriptor> = walker(dir.path(), &test_config(), None).collect();
        let denied = found.iter().find(|d| d.name == "locked.txt").unwrap();
        assert_eq!(denied.skip_reason, Some(SkipReason::AccessDenied));
        assert_eq!(denied.permissions, "000");
        let open = found.iter().find(|d| d.name == "open.txt").unwrap();
        assert!(open.skip_reason.is_none());

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn test_restricted_paths_not_yielded() {
        let dir = fixture();
        let mut config = test_config();
        config.security.restricted_paths = vec![
            dir.path().join("sub").display().to_string(),
            dir.path().join("b.md").display().to_string(),
        ];
        assert_eq!(names(walker(dir.path(), &config, None)), vec!["a.txt"]);
    }
}
