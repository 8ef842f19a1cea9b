//! Content processing module
//!
//! Turns raw bytes into archive records: classification, encoding
//! conversion, sanitization, pretty-printing, and metadata extraction.

pub mod classify;
pub mod css;
pub mod encoding;
pub mod format;
pub mod js;
pub mod metadata;
pub mod sanitize;

pub use classify::{is_binary, ContentKind};
pub use metadata::{ContentMetadata, MetadataDetails};

use crate::config::{Config, EncodingConfig};
use crate::output::{ContentRecord, SkipReason};
use std::path::Path;

/// Stateless processing pipeline configured once per run
#[derive(Debug, Clone)]
pub struct ContentProcessor {
    encoding: EncodingConfig,
    skip_binary: bool,
}

impl ContentProcessor {
    pub fn new(config: &Config) -> Self {
        Self {
            encoding: config.encoding.clone(),
            skip_binary: config.scan.skip_binary,
        }
    }

    /// MIME type of `content`; see [`classify::classify`]
    pub fn classify(&self, content: &[u8], filename: Option<&str>) -> String {
        classify::classify(content, filename)
    }

    /// Name of the detected encoding, or of the configured fallback when
    /// detection is not confident
    pub fn detect_encoding(&self, content: &[u8]) -> &'static str {
        encoding::detect_encoding(content, self.encoding.min_confidence, &self.encoding.fallback)
            .name()
    }

    /// Decodes `content` via `target`; returns the text and the source encoding
    pub fn convert_encoding(&self, content: &[u8], target: &str) -> (String, String) {
        encoding::convert_encoding(
            content,
            target,
            self.encoding.min_confidence,
            &self.encoding.fallback,
        )
    }

    /// Strips active content from HTML and CSS; other types pass through
    ///
    /// Never fails: content that cannot be processed is returned unchanged.
    pub fn sanitize(&self, text: &str, content_type: &str) -> String {
        let result = match ContentKind::from_mime(content_type) {
            ContentKind::Html => sanitize::sanitize_html(text).map_err(|e| e.to_string()),
            ContentKind::Css => sanitize::sanitize_css(text).map_err(|e| e.to_string()),
            _ => return text.to_string(),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!("Sanitizing {} failed, keeping original: {}", content_type, e);
            text.to_string()
        })
    }

    /// Pretty-prints structured content; other types pass through
    ///
    /// Never fails: content that does not parse is returned unchanged.
    pub fn format(&self, text: &str, content_type: &str) -> String {
        let result = match ContentKind::from_mime(content_type) {
            ContentKind::Html => Ok(format::prettify_html(text)),
            ContentKind::Css => css::Stylesheet::parse(text)
                .map(|sheet| sheet.to_css_string())
                .map_err(|e| e.to_string()),
            ContentKind::Json => format::prettify_json(text).map_err(|e| e.to_string()),
            ContentKind::Yaml => format::prettify_yaml(text).map_err(|e| e.to_string()),
            _ => return text.to_string(),
        };

        result.unwrap_or_else(|e| {
            tracing::debug!("Formatting {} failed, keeping original: {}", content_type, e);
            text.to_string()
        })
    }

    pub fn extract_metadata(&self, content: &[u8], content_type: &str) -> ContentMetadata {
        metadata::extract_metadata(content, content_type)
    }

    /// Runs the full per-file pipeline
    ///
    /// Binary content becomes a `binary_file` skip record when binaries are
    /// skipped, or a metadata-only record otherwise. Text is converted to
    /// the default encoding, formatted, and described.
    pub fn process(&self, content: &[u8], path: &str) -> ContentRecord {
        let filename = Path::new(path).file_name().and_then(|name| name.to_str());
        let content_type = self.classify(content, filename);
        let kind = ContentKind::from_mime(&content_type);

        // Unknown application/* types still count as text when the bytes say so
        if kind == ContentKind::Binary && is_binary(content) {
            let metadata = self.extract_metadata(content, &content_type);
            return if self.skip_binary {
                tracing::debug!("Skipping binary file {}", path);
                ContentRecord::skipped(path, SkipReason::BinaryFile).with_metadata(metadata)
            } else {
                ContentRecord::metadata_only(path, metadata)
            };
        }

        let (text, source_encoding) = self.convert_encoding(content, &self.encoding.default);
        tracing::debug!("Decoded {} from {}", path, source_encoding);

        let formatted = self.format(&text, &content_type);
        let metadata = self.extract_metadata(formatted.as_bytes(), &content_type);
        ContentRecord::text(path, formatted, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> ContentProcessor {
        ContentProcessor::new(&Config::default())
    }

    #[test]
    fn test_sanitize_dispatch() {
        let p = processor();
        let html = p.sanitize("<p onclick=\"x()\">a</p><script>1</script>", "text/html");
        assert_eq!(html, "<p>a</p>");

        let css = p.sanitize("a { width: expression(1); color: red }", "text/css");
        assert!(!css.contains("expression"));

        let plain = "<script>stays</script>";
        assert_eq!(p.sanitize(plain, "text/plain"), plain);
    }

    #[test]
    fn test_sanitize_failure_returns_original() {
        let broken = "a { color: red";
        assert_eq!(processor().sanitize(broken, "text/css"), broken);
    }

    #[test]
    fn test_format_dispatch() {
        let p = processor();
        assert_eq!(p.format(r#"{"a":1}"#, "application/json"), "{\n  \"a\": 1\n}");
        assert_eq!(p.format("a{color:red}", "text/css"), "a {\n    color: red;\n}\n");
        assert_eq!(p.format("{not json", "application/json"), "{not json");
        assert_eq!(p.format("x  y", "text/plain"), "x  y");
    }

    #[test]
    fn test_detect_encoding_name() {
        assert_eq!(processor().detect_encoding("ok".as_bytes()), "UTF-8");
    }

    #[test]
    fn test_process_text_file() {
        let record = processor().process(br#"{"b":2,"a":1}"#, "dir/data.json");
        assert_eq!(record.path, "dir/data.json");
        assert!(record.skip_reason.is_none());
        assert_eq!(record.content.as_deref(), Some("{\n  \"b\": 2,\n  \"a\": 1\n}"));
        let metadata = record.metadata.unwrap();
        assert_eq!(metadata.content_type, "application/json");
    }

    #[test]
    fn test_process_binary_file_is_skipped() {
        let record = processor().process(&[0x89, b'P', b'N', b'G', 0x00, 0x01], "img/logo.png");
        assert_eq!(record.skip_reason, Some(SkipReason::BinaryFile));
        assert!(record.content.is_none());
        assert_eq!(record.metadata.unwrap().content_type, "image/png");
    }

    #[test]
    fn test_process_binary_kept_as_metadata_when_not_skipping() {
        let mut config = Config::default();
        config.scan.skip_binary = false;
        let record = ContentProcessor::new(&config).process(&[0, 1, 2], "blob.bin");
        assert!(record.skip_reason.is_none());
        assert!(record.content.is_none());
        assert!(record.metadata.is_some());
    }

    #[test]
    fn test_process_text_with_unknown_application_type() {
        let record = processor().process(b"#!/bin/sh\necho hi\n", "run.sh");
        assert!(record.skip_reason.is_none());
        assert_eq!(record.content.as_deref(), Some("#!/bin/sh\necho hi\n"));
    }
}
