//! Output module for archive documents and run summaries
//!
//! This module handles:
//! - The serializable site and system snapshot documents
//! - Per-item content records and skip reasons
//! - Printing run statistics

mod document;
pub mod stats;

pub use document::{
    ArchiveStatistics, ContentRecord, HtmlSection, ResourceEntry, SiteDocument, SiteMetadata,
    SiteRunConfig, SiteSnapshot, SkipReason, SystemDocument, SystemMetadata, SystemRunConfig,
    SystemSnapshot,
};
pub use stats::print_statistics;
