//! Site mode: one page plus its resources

use super::progress::{ProgressPlan, ProgressStep};
use super::{ArchiveOutcome, Archiver};
use crate::content::classify::{CSS, HTML, JAVASCRIPT};
use crate::content::ContentProcessor;
use crate::fetcher::{Download, Fetcher, RESOURCE_TYPES};
use crate::output::{
    ArchiveStatistics, ContentRecord, HtmlSection, ResourceEntry, SiteDocument, SiteMetadata,
    SiteRunConfig, SiteSnapshot,
};
use crate::state::RunTracker;
use crate::storage::{sanitize_filename, timestamped_name, unique_path};
use crate::traverse::WebTraverser;
use crate::url::{file_name_from_url, guess_extension, validate_url};
use crate::{Result, SnapshotError};
use chrono::{Local, Utc};
use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

/// Binary resource kinds saved next to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn dir_name(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }

    fn accepts(&self, content_type: &str) -> bool {
        let prefix = match self {
            MediaKind::Image => "image/",
            MediaKind::Video => "video/",
        };
        content_type.trim().to_ascii_lowercase().starts_with(prefix)
    }
}

/// Subdirectories created inside every site directory
const SITE_DIRS: &[&str] = &["images", "videos", "styles", "scripts"];

/// Local file name for a resource
///
/// The URL's last path segment when it has one, else a digest-based name.
/// Names without an extension get one guessed from the content type.
fn resource_file_name(url: &str, content_type: &str) -> String {
    let parsed = Url::parse(url).ok();
    let mut name = parsed
        .as_ref()
        .and_then(file_name_from_url)
        .unwrap_or_else(|| {
            let digest = hex::encode(Sha256::digest(url.as_bytes()));
            format!("resource_{}", &digest[..16])
        });
    if !name.contains('.') {
        if let Some(parsed) = &parsed {
            name.push_str(&guess_extension(parsed, Some(content_type)));
        }
    }
    sanitize_filename(&name)
}

/// Sanitize, format and describe one stylesheet or script body
fn process_text(
    processor: &ContentProcessor,
    path: String,
    text: &str,
    content_type: &str,
) -> ContentRecord {
    let cleaned = processor.sanitize(text, content_type);
    let formatted = processor.format(&cleaned, content_type);
    let metadata = processor.extract_metadata(formatted.as_bytes(), content_type);
    ContentRecord::text(path, formatted, metadata)
}

impl Archiver {
    pub(super) async fn run_site(
        &self,
        raw_url: &str,
        output_dir: &Path,
        tracker: &mut RunTracker,
        progress: &mut ProgressPlan,
    ) -> Result<ArchiveOutcome> {
        let security = &self.config.security;
        let checked = validate_url(raw_url, &security.allowed_protocols, security.warn_on_http)?;
        if checked.insecure {
            tracing::warn!("Archiving over insecure HTTP: {}", checked.url);
        }

        let site_dir = output_dir.join(timestamped_name("site", Local::now()));
        let document_path = site_dir.join("site_data.yaml");
        self.store.validate_path(&document_path)?;
        for dir in SITE_DIRS {
            tokio::fs::create_dir_all(site_dir.join(dir)).await?;
        }
        progress.complete(ProgressStep::Setup);

        tracker.advance()?;
        let fetcher = Fetcher::new(&self.config, self.limiter.clone())?;
        let page = fetcher
            .fetch_page(checked.url.as_str())
            .await
            .ok_or_else(|| SnapshotError::PageUnavailable(checked.url.to_string()))?;
        let (html, source_encoding) =
            self.processor
                .convert_encoding(&page.body, &self.config.encoding.default);
        tracing::debug!("Page decoded from {}", source_encoding);

        let tasks = WebTraverser::new().extract(&html, &page.url);
        let mut stats = ArchiveStatistics {
            expected_files: (tasks.media_count()
                + tasks.stylesheets.len()
                + tasks.scripts.len()
                + tasks.inline_styles.len()
                + tasks.inline_scripts.len()) as u64,
            ..ArchiveStatistics::default()
        };
        progress.complete(ProgressStep::PageFetch);

        // Images and videos
        tracker.advance()?;
        let media: Vec<(MediaKind, &Url)> = tasks
            .images
            .iter()
            .map(|u| (MediaKind::Image, u))
            .chain(tasks.videos.iter().map(|u| (MediaKind::Video, u)))
            .collect();
        let downloads = join_all(
            media
                .iter()
                .map(|(_, url)| fetcher.fetch_resource(url.as_str())),
        )
        .await;

        let mut images = Vec::new();
        let mut videos = Vec::new();
        let total = downloads.len();
        for (done, ((kind, _), result)) in media.iter().zip(downloads).enumerate() {
            let saved = match result.outcome {
                Ok(download) => self.save_media(*kind, result.url, download, &site_dir).await,
                Err(failure) if failure.is_declined() => Ok(None),
                Err(failure) => Err(SnapshotError::Fetch(failure)),
            };
            match saved {
                Ok(Some(entry)) => {
                    stats.record_processed();
                    match kind {
                        MediaKind::Image => images.push(entry),
                        MediaKind::Video => videos.push(entry),
                    }
                }
                Ok(None) => stats.record_skipped(),
                Err(e) => {
                    tracing::error!("Failed to save resource: {}", e);
                    stats.record_error();
                }
            }
            progress.tasks_done(ProgressStep::Resources, done + 1, total);
        }
        progress.tasks_done(ProgressStep::Resources, total, total);

        // Stylesheets and scripts
        let externals: Vec<(&Url, &'static str)> = tasks
            .stylesheets
            .iter()
            .map(|u| (u, CSS))
            .chain(tasks.scripts.iter().map(|u| (u, JAVASCRIPT)))
            .collect();
        let bodies = join_all(
            externals
                .iter()
                .map(|(url, _)| fetcher.fetch_text(url.as_str())),
        )
        .await;

        let mut jobs: Vec<(String, String, &'static str)> = Vec::new();
        for ((url, content_type), result) in externals.iter().zip(bodies) {
            match result {
                Ok(text) => jobs.push((url.to_string(), text, *content_type)),
                Err(failure) if failure.is_declined() => stats.record_skipped(),
                Err(_) => stats.record_error(),
            }
        }
        for body in &tasks.inline_styles {
            jobs.push(("inline".to_string(), body.clone(), CSS));
        }
        for body in &tasks.inline_scripts {
            jobs.push(("inline".to_string(), body.clone(), JAVASCRIPT));
        }

        let handles = jobs.into_iter().map(|(path, text, content_type)| {
            let processor = self.processor.clone();
            tokio::task::spawn_blocking(move || {
                (content_type, process_text(&processor, path, &text, content_type))
            })
        });
        let processed = join_all(handles).await;

        let mut css = Vec::new();
        let mut javascript = Vec::new();
        let total = processed.len();
        for (done, joined) in processed.into_iter().enumerate() {
            match joined {
                Ok((content_type, record)) => {
                    stats.record_processed();
                    if content_type == CSS {
                        css.push(record);
                    } else {
                        javascript.push(record);
                    }
                }
                Err(e) => {
                    tracing::error!("Processing task failed: {}", e);
                    stats.record_error();
                }
            }
            progress.tasks_done(ProgressStep::StylesAndScripts, done + 1, total);
        }
        progress.tasks_done(ProgressStep::StylesAndScripts, total, total);

        tracker.advance()?;
        let cleaned = self.processor.sanitize(&html, HTML);
        let main_html = self.processor.format(&cleaned, HTML);
        let main_metadata = self.processor.extract_metadata(main_html.as_bytes(), HTML);

        let document = SiteDocument {
            site: SiteSnapshot {
                html: HtmlSection {
                    main: main_html,
                    metadata: main_metadata,
                },
                css,
                javascript,
                images,
                videos,
                metadata: SiteMetadata {
                    url: checked.url.to_string(),
                    extracted_at: Utc::now(),
                    config: SiteRunConfig {
                        max_resource_size: self.config.limits.max_file_size,
                        resource_types: RESOURCE_TYPES.iter().map(|t| t.to_string()).collect(),
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

        tracing::info!("Site archived to {}", document_path.display());
        Ok(ArchiveOutcome {
            path: document_path,
            statistics: stats,
        })
    }

    /// Writes a downloaded image or video under the site directory
    ///
    /// `Ok(None)` means the content type does not match the resource kind.
    async fn save_media(
        &self,
        kind: MediaKind,
        url: String,
        download: Download,
        site_dir: &Path,
    ) -> Result<Option<ResourceEntry>> {
        if !kind.accepts(&download.content_type) {
            tracing::warn!(
                "Unexpected content type for {}: {}",
                url,
                download.content_type
            );
            return Ok(None);
        }

        let dir = site_dir.join(kind.dir_name());
        let name = resource_file_name(&url, &download.content_type);
        let local: PathBuf = unique_path(&dir.join(name));
        let file_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.persist(local.clone(), download.content).await?;
        tracing::debug!("Saved {} to {}", url, local.display());

        Ok(Some(ResourceEntry {
            path: url,
            local_path: format!("./{}/{}", kind.dir_name(), file_name),
            content_type: download.content_type,
            size: download.size,
        }))
    }
}
