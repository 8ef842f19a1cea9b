//! Archive document model
//!
//! These types serialize to the YAML snapshot files. Top-level keys are
//! `site` and `system`; field order is the serialization order.

use crate::content::ContentMetadata;
use crate::traverse::TreeNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an item was recorded without content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    SizeLimitExceeded,
    AccessDenied,
    BinaryFile,
    ReadError,
    ResourceLimit,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::SizeLimitExceeded => "size_limit_exceeded",
            SkipReason::AccessDenied => "access_denied",
            SkipReason::BinaryFile => "binary_file",
            SkipReason::ReadError => "read_error",
            SkipReason::ResourceLimit => "resource_limit",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One archived item: a file, a stylesheet, or a script
///
/// A record with a skip reason never carries content; the constructors are
/// the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRecord {
    /// File path, resource URL, or `inline`
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ContentMetadata>,

    #[serde(rename = "skipped", skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl ContentRecord {
    fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: None,
            size: None,
            modified_at: None,
            content: None,
            metadata: None,
            skip_reason: None,
        }
    }

    pub fn text(path: impl Into<String>, content: String, metadata: ContentMetadata) -> Self {
        Self {
            content: Some(content),
            metadata: Some(metadata),
            ..Self::empty(path)
        }
    }

    pub fn metadata_only(path: impl Into<String>, metadata: ContentMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::empty(path)
        }
    }

    pub fn skipped(path: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            skip_reason: Some(reason),
            ..Self::empty(path)
        }
    }

    pub fn with_metadata(mut self, metadata: ContentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attaches file-system facts (extension, size, modification time)
    pub fn with_file_info(
        mut self,
        format: impl Into<String>,
        size: u64,
        modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.format = Some(format.into());
        self.size = Some(size);
        self.modified_at = modified_at;
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }
}

/// Per-run item counts
///
/// `total_files` is the number of items observed, so the other three
/// counters always sum to it. `expected_files` is the pre-scan estimate used
/// for progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveStatistics {
    pub total_files: u64,
    pub processed_files: u64,
    pub skipped_files: u64,
    pub error_files: u64,
    #[serde(default)]
    pub expected_files: u64,
}

impl ArchiveStatistics {
    pub fn record_processed(&mut self) {
        self.total_files += 1;
        self.processed_files += 1;
    }

    pub fn record_skipped(&mut self) {
        self.total_files += 1;
        self.skipped_files += 1;
    }

    pub fn record_error(&mut self) {
        self.total_files += 1;
        self.error_files += 1;
    }
}

// ===== Site mode =====

#[derive(Debug, Clone, Serialize)]
pub struct SiteDocument {
    pub site: SiteSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteSnapshot {
    pub html: HtmlSection,
    pub css: Vec<ContentRecord>,
    pub javascript: Vec<ContentRecord>,
    pub images: Vec<ResourceEntry>,
    pub videos: Vec<ResourceEntry>,
    pub metadata: SiteMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct HtmlSection {
    pub main: String,
    pub metadata: ContentMetadata,
}

/// A binary resource saved next to the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEntry {
    /// Source URL
    pub path: String,

    /// Location relative to the document, e.g. `./images/logo.png`
    pub local_path: String,

    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteMetadata {
    pub url: String,
    pub extracted_at: DateTime<Utc>,
    pub config: SiteRunConfig,
    pub statistics: ArchiveStatistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteRunConfig {
    pub max_resource_size: u64,
    pub resource_types: Vec<String>,
}

// ===== System mode =====

#[derive(Debug, Clone, Serialize)]
pub struct SystemDocument {
    pub system: SystemSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub structure_tree: TreeNode,
    pub contents: Vec<ContentRecord>,
    pub metadata: SystemMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemMetadata {
    pub base_path: String,
    pub saved_at: DateTime<Utc>,
    pub config: SystemRunConfig,
    pub statistics: ArchiveStatistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemRunConfig {
    pub max_file_size: u64,
    pub skip_binary: bool,
    pub max_depth: Option<usize>,
}
