//! Typed fetch outcomes

use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a fetch produced no content
///
/// Every variant is non-fatal: the caller records the failure and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("URL already fetched in this run")]
    DuplicateUrl,

    #[error("Protocol not allowed: {0}")]
    InvalidProtocol(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrlFormat(String),

    #[error("Connection limit reached")]
    ConnectionLimit,

    #[error("Memory or CPU limit reached")]
    ResourceLimit,

    #[error("Content type not allowed: {0}")]
    InvalidContentType(String),

    #[error("Size {size} exceeds limit {limit}")]
    SizeExceeded { size: u64, limit: u64 },

    #[error("Bandwidth limit reached")]
    BandwidthLimit,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl FetchFailure {
    /// Short reason code, as logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateUrl => "duplicate-url",
            Self::InvalidProtocol(_) => "invalid-protocol",
            Self::InvalidUrlFormat(_) => "invalid-url-format",
            Self::ConnectionLimit => "connection-limit",
            Self::ResourceLimit => "resource-limit",
            Self::InvalidContentType(_) => "invalid-content-type",
            Self::SizeExceeded { .. } => "size-exceeded",
            Self::BandwidthLimit => "bandwidth-limit",
            Self::Transport(_) => "transport-error",
            Self::Unexpected(_) => "unexpected-error",
        }
    }

    /// True when the fetch was declined by a rule or budget rather than
    /// failing on the wire
    pub fn is_declined(&self) -> bool {
        !matches!(
            self,
            Self::InvalidUrlFormat(_) | Self::Transport(_) | Self::Unexpected(_)
        )
    }
}

/// A successfully downloaded body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub content: Vec<u8>,
    pub content_type: String,
    pub size: u64,
}

/// Outcome of one resource fetch
///
/// Content exists only inside the `Ok` arm, so a failed result can never
/// carry a body.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub url: String,
    pub elapsed: Duration,
    pub outcome: Result<Download, FetchFailure>,
}

impl DownloadResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn download(&self) -> Option<&Download> {
        self.outcome.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        self.outcome.as_ref().err()
    }
}

/// A fetched HTML page, body still undecoded
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects
    pub url: Url,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}
