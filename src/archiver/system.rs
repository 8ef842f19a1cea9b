//! System mode: a directory tree and its file contents

use super::progress::{ProgressPlan, ProgressStep};
use super::{ArchiveOutcome, Archiver};
use crate::content::ContentProcessor;
use crate::output::{
    ArchiveStatistics, ContentRecord, SkipReason, SystemDocument, SystemMetadata, SystemRunConfig,
    SystemSnapshot,
};
use crate::state::RunTracker;
use crate::storage::timestamped_name;
use crate::traverse::{
    structure_tree, FileDescriptor, FsTraverser, PerformanceGuard, ScanRules, TreeNode,
    WalkOptions,
};
use crate::{Result, SnapshotError};
use chrono::{Local, Utc};
use futures::future::join_all;
use futures::StreamExt;
use std::fs;
use std::path::Path;

/// Reads and processes one file yielded by the walk
///
/// Never fails: problems become skip records.
fn process_file(descriptor: FileDescriptor, processor: &ContentProcessor) -> ContentRecord {
    let path = descriptor.path.display().to_string();

    let record = match descriptor.skip_reason {
        Some(reason) => ContentRecord::skipped(path, reason),
        None => match fs::read(&descriptor.path) {
            Ok(bytes) => processor.process(&bytes, &path),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path, e);
                ContentRecord::skipped(path, SkipReason::ReadError)
            }
        },
    };

    record.with_file_info(descriptor.extension, descriptor.size, descriptor.modified_at)
}

impl Archiver {
    pub(super) async fn run_system(
        &self,
        root: &Path,
        output_dir: &Path,
        pattern: Option<&str>,
        tracker: &mut RunTracker,
        progress: &mut ProgressPlan,
    ) -> Result<ArchiveOutcome> {
        if !root.is_dir() {
            return Err(SnapshotError::InvalidInput(format!(
                "not a directory: {}",
                root.display()
            )));
        }
        let rules = ScanRules::from_config(&self.config, pattern)?;
        if rules.is_restricted(root) {
            return Err(SnapshotError::InvalidInput(format!(
                "restricted path: {}",
                root.display()
            )));
        }

        let document_path =
            output_dir.join(format!("{}.yaml", timestamped_name("system", Local::now())));
        self.store.validate_path(&document_path)?;
        progress.complete(ProgressStep::Setup);

        tracker.advance()?;
        let max_depth = self.config.limits.max_depth;
        let tree = {
            let root = root.to_path_buf();
            let rules = rules.clone();
            let mut guard =
                PerformanceGuard::new(&self.config.scan, self.probe.clone(), self.clock.clone());
            tokio::task::spawn_blocking(move || structure_tree(&root, max_depth, &rules, &mut guard))
                .await?
        };
        let expected = tree.file_count();
        tracing::info!("Structure scan found {} files", expected);
        progress.complete(ProgressStep::StructureScan);

        tracker.advance()?;
        let mut stats = ArchiveStatistics {
            expected_files: expected,
            ..ArchiveStatistics::default()
        };
        let mut contents = Vec::new();

        let traverser = FsTraverser::with_parts(
            root,
            rules,
            WalkOptions::from_config(&self.config),
            &self.config,
            self.probe.clone(),
            self.clock.clone(),
        );
        let mut batches = traverser.into_stream().chunks(self.config.scan.batch_size);

        while let Some(batch) = batches.next().await {
            let handles = batch.into_iter().map(|descriptor| {
                let processor = self.processor.clone();
                let resources_ok = self.limiter.check_resources();
                tokio::task::spawn_blocking(move || {
                    if resources_ok {
                        process_file(descriptor, &processor)
                    } else {
                        let path = descriptor.path.display().to_string();
                        ContentRecord::skipped(path, SkipReason::ResourceLimit).with_file_info(
                            descriptor.extension,
                            descriptor.size,
                            descriptor.modified_at,
                        )
                    }
                })
            });

            for joined in join_all(handles).await {
                match joined {
                    Ok(record) => {
                        if record.is_skipped() {
                            stats.record_skipped();
                        } else {
                            stats.record_processed();
                        }
                        contents.push(record);
                    }
                    Err(e) => {
                        tracing::error!("File task failed: {}", e);
                        stats.record_error();
                    }
                }
            }

            let seen = stats.total_files as usize;
            progress.tasks_done(ProgressStep::FileContents, seen, (expected as usize).max(seen));
            tracing::debug!("Processed batch, {} of ~{} files", seen, expected);
        }
        progress.complete(ProgressStep::FileContents);

        tracker.advance()?;
        let document = SystemDocument {
            system: SystemSnapshot {
                structure_tree: TreeNode::Directory(tree),
                contents,
                metadata: SystemMetadata {
                    base_path: root.display().to_string(),
                    saved_at: Utc::now(),
                    config: SystemRunConfig {
                        max_file_size: self.config.limits.max_file_size,
                        skip_binary: self.config.scan.skip_binary,
                        max_depth,
                    },
                    statistics: stats,
                },
            },
        };

        tracker.advance()?;
        let yaml = serde_yaml::to_string(&document)?;
        self.persist(document_path.clone(), yaml.into_bytes()).await?;
        progress.complete(ProgressStep::Write);
        tracker.advance()?;
        progress.complete(ProgressStep::Finish);

        tracing::info!("Directory archived to {}", document_path.display());
        Ok(ArchiveOutcome {
            path: document_path,
            statistics: stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::load_system_snapshot;
    use crate::config::Config;
    use crate::limiter::{FixedProbe, ManualClock};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn archiver(config: Config) -> Archiver {
        Archiver::with_parts(
            Arc::new(config),
            Arc::new(FixedProbe::default()),
            Arc::new(ManualClock::new()),
        )
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.security.restricted_paths.clear();
        config
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("readme.md"), "# Title\n").unwrap();
        fs::write(root.join("data.json"), r#"{"k":[1,2]}"#).unwrap();
        fs::write(root.join("blob.bin"), [0u8, 159, 146, 150, 0, 1]).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/app.js"), "export function main() {}\n").unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "[core]").unwrap();
        dir
    }

    #[test]
    fn test_process_file_skip_reason_kept() {
        let dir = fixture();
        let path = dir.path().join("readme.md");
        let metadata = fs::metadata(&path).unwrap();
        let mut descriptor = crate::traverse::describe(&path, &metadata, 1_000);
        descriptor.skip_reason = Some(SkipReason::SizeLimitExceeded);

        let processor = ContentProcessor::new(&test_config());
        let record = process_file(descriptor, &processor);
        assert_eq!(record.skip_reason, Some(SkipReason::SizeLimitExceeded));
        assert_eq!(record.format.as_deref(), Some(".md"));
        assert!(record.content.is_none());
    }

    #[tokio::test]
    async fn test_archive_system_end_to_end() {
        let source = fixture();
        let out = TempDir::new().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let archiver =
            archiver(test_config()).on_progress(Arc::new(move |p| sink.lock().unwrap().push(p)));

        let outcome = archiver
            .archive_system(source.path(), out.path(), None)
            .await
            .unwrap();

        let stats = outcome.statistics;
        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.expected_files, 4);
        assert_eq!(stats.skipped_files, 1);
        assert_eq!(stats.processed_files, 3);
        assert_eq!(stats.error_files, 0);

        let name = outcome.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("system_") && name.ends_with(".yaml"));

        let doc = load_system_snapshot(archiver.store(), &outcome.path).unwrap();
        let system = &doc["system"];
        assert_eq!(system["structure_tree"]["type"], "directory");
        assert_eq!(system["contents"].as_sequence().unwrap().len(), 4);
        assert_eq!(system["metadata"]["statistics"]["total_files"], 4);
        assert_eq!(system["metadata"]["config"]["skip_binary"], true);

        let contents = system["contents"].as_sequence().unwrap();
        let json = contents
            .iter()
            .find(|c| c["path"].as_str().unwrap().ends_with("data.json"))
            .unwrap();
        assert_eq!(json["content"], "{\n  \"k\": [\n    1,\n    2\n  ]\n}");
        let blob = contents
            .iter()
            .find(|c| c["path"].as_str().unwrap().ends_with("blob.bin"))
            .unwrap();
        assert_eq!(blob["skipped"], "binary_file");

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!((seen.last().unwrap() - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_archive_system_with_pattern() {
        let source = fixture();
        let out = TempDir::new().unwrap();
        let outcome = archiver(test_config())
            .archive_system(source.path(), out.path(), Some("*.js"))
            .await
            .unwrap();
        assert_eq!(outcome.statistics.total_files, 1);
        assert_eq!(outcome.statistics.processed_files, 1);
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let out = TempDir::new().unwrap();
        let err = archiver(test_config())
            .archive_system(&out.path().join("nope"), out.path(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cpu_ceiling_skips_files() {
        let source = fixture();
        let out = TempDir::new().unwrap();
        let mut config = test_config();
        config.limits.max_cpu_percent = 50.0;
        let archiver = Archiver::with_parts(
            Arc::new(config),
            Arc::new(FixedProbe::new(0, 99.0)),
            Arc::new(ManualClock::new()),
        );

        let outcome = archiver
            .archive_system(source.path(), out.path(), None)
            .await
            .unwrap();
        assert_eq!(outcome.statistics.total_files, 4);
        assert_eq!(outcome.statistics.skipped_files, 4);

        let doc = load_system_snapshot(archiver.store(), &outcome.path).unwrap();
        let contents = doc["system"]["contents"].as_sequence().unwrap();
        assert!(contents.iter().all(|c| c["skipped"] == "resource_limit"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_counted_as_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let source = fixture();
        let locked = source.path().join("locked.txt");
        fs::write(&locked, "private").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::File::open(&locked).is_ok() {
            return;
        }

        let out = TempDir::new().unwrap();
        let archiver = archiver(test_config());
        let outcome = archiver
            .archive_system(source.path(), out.path(), None)
            .await
            .unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        // blob.bin and locked.txt
        assert_eq!(outcome.statistics.total_files, 5);
        assert_eq!(outcome.statistics.skipped_files, 2);

        let doc = load_system_snapshot(archiver.store(), &outcome.path).unwrap();
        let contents = doc["system"]["contents"].as_sequence().unwrap();
        let denied = contents
            .iter()
            .find(|c| c["path"].as_str().unwrap().ends_with("locked.txt"))
            .unwrap();
        assert_eq!(denied["skipped"], "access_denied");
        assert!(denied.get("content").is_none());
    }
}
